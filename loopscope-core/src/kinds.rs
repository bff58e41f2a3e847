//! ## loopscope-core::kinds
//! **Closed vocabularies of the simulated runtime**
//!
//! Environments, lifecycle phases, engine status, task kinds and the queue
//! selectors used by `dequeueAndRun`. Serialized names follow the scenario
//! authoring format (camelCase, `rAF`, `node` accepted for the server
//! environment).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical colour tags, keyed by queue/area and task kind.
pub mod palette {
    pub const CALL_STACK: &str = "#60a5fa";
    pub const MICROTASK: &str = "#a78bfa";
    pub const MACROTASK: &str = "#fbbf24";
    pub const PENDING: &str = "#94a3b8";
    pub const RENDER: &str = "#34d399";
    pub const PRIORITY: &str = "#f472b6";
    pub const FETCH: &str = "#38bdf8";
    pub const DOM_EVENT: &str = "#fb923c";
    pub const SET_IMMEDIATE: &str = "#2dd4bf";
    pub const IO: &str = "#a3e635";
}

/// The two concrete runtime variants that can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Browser,
    #[serde(alias = "node")]
    Server,
}

impl Environment {
    /// Phases of one scheduling iteration, in loop order.
    pub fn phases(self) -> &'static [Phase] {
        match self {
            Environment::Browser => &[Phase::Script, Phase::Task, Phase::Microtasks, Phase::Render],
            Environment::Server => &[
                Phase::Script,
                Phase::Timers,
                Phase::Pending,
                Phase::Poll,
                Phase::Check,
                Phase::Close,
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Browser => "browser",
            Environment::Server => "server",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named stage of a scheduling iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Script,
    Task,
    Microtasks,
    Render,
    Timers,
    Pending,
    Poll,
    Check,
    Close,
}

impl Phase {
    /// Human label of the phase as shown for the given environment.
    pub fn label(self, environment: Environment) -> &'static str {
        match (environment, self) {
            (_, Phase::Idle) => "Idle",
            (_, Phase::Script) => "Evaluate Script",
            (Environment::Browser, Phase::Task) => "Run Task",
            (Environment::Browser, Phase::Microtasks) => "Drain Microtasks",
            (Environment::Browser, Phase::Render) => "Render",
            (Environment::Server, Phase::Timers) => "Timers",
            (Environment::Server, Phase::Pending) => "Pending Callbacks",
            (Environment::Server, Phase::Poll) => "Poll",
            (Environment::Server, Phase::Check) => "Check",
            (Environment::Server, Phase::Close) => "Close Callbacks",
            (Environment::Server, Phase::Microtasks) => "Microtasks",
            (_, other) => other.as_str(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Script => "script",
            Phase::Task => "task",
            Phase::Microtasks => "microtasks",
            Phase::Render => "render",
            Phase::Timers => "timers",
            Phase::Pending => "pending",
            Phase::Poll => "poll",
            Phase::Check => "check",
            Phase::Close => "close",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback status of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

/// Kind tag of a task or pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    Sync,
    SetTimeout,
    SetInterval,
    Promise,
    QueueMicrotask,
    Fetch,
    DomEvent,
    #[serde(rename = "rAF")]
    AnimationFrame,
    MutationObserver,
    NextTick,
    SetImmediate,
    Io,
}

impl TaskKind {
    pub const ALL: [TaskKind; 12] = [
        TaskKind::Sync,
        TaskKind::SetTimeout,
        TaskKind::SetInterval,
        TaskKind::Promise,
        TaskKind::QueueMicrotask,
        TaskKind::Fetch,
        TaskKind::DomEvent,
        TaskKind::AnimationFrame,
        TaskKind::MutationObserver,
        TaskKind::NextTick,
        TaskKind::SetImmediate,
        TaskKind::Io,
    ];

    pub fn canonical_color(self) -> &'static str {
        match self {
            TaskKind::Sync => palette::CALL_STACK,
            TaskKind::Promise | TaskKind::QueueMicrotask | TaskKind::MutationObserver => {
                palette::MICROTASK
            }
            TaskKind::SetTimeout | TaskKind::SetInterval | TaskKind::DomEvent => palette::MACROTASK,
            TaskKind::Fetch | TaskKind::Io => palette::FETCH,
            TaskKind::AnimationFrame => palette::RENDER,
            TaskKind::NextTick => palette::PRIORITY,
            TaskKind::SetImmediate => palette::SET_IMMEDIATE,
        }
    }

    /// Whether a pending operation of this kind resolves into the microtask queue.
    pub fn resolves_to_microtask(self) -> bool {
        matches!(self, TaskKind::Fetch | TaskKind::Promise)
    }

    /// Queue an ad-hoc task of this kind is routed to, if any.
    pub fn adhoc_queue(self) -> Option<QueueSelector> {
        match self {
            TaskKind::Promise | TaskKind::QueueMicrotask | TaskKind::MutationObserver => {
                Some(QueueSelector::Microtask)
            }
            TaskKind::SetTimeout | TaskKind::SetInterval | TaskKind::DomEvent => {
                Some(QueueSelector::Macrotask)
            }
            TaskKind::NextTick => Some(QueueSelector::NextTick),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Sync => "sync",
            TaskKind::SetTimeout => "setTimeout",
            TaskKind::SetInterval => "setInterval",
            TaskKind::Promise => "promise",
            TaskKind::QueueMicrotask => "queueMicrotask",
            TaskKind::Fetch => "fetch",
            TaskKind::DomEvent => "domEvent",
            TaskKind::AnimationFrame => "rAF",
            TaskKind::MutationObserver => "mutationObserver",
            TaskKind::NextTick => "nextTick",
            TaskKind::SetImmediate => "setImmediate",
            TaskKind::Io => "io",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown task kind '{s}'"))
    }
}

/// One of the three FIFO task queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueSelector {
    Microtask,
    Macrotask,
    /// The nextTick-equivalent priority queue.
    #[serde(alias = "priority")]
    NextTick,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promise_and_fetch_resolve_to_microtasks() {
        for kind in TaskKind::ALL {
            let expected = matches!(kind, TaskKind::Promise | TaskKind::Fetch);
            assert_eq!(kind.resolves_to_microtask(), expected, "{kind}");
        }
    }

    #[test]
    fn adhoc_mapping_covers_queue_kinds_only() {
        assert_eq!(TaskKind::Promise.adhoc_queue(), Some(QueueSelector::Microtask));
        assert_eq!(TaskKind::DomEvent.adhoc_queue(), Some(QueueSelector::Macrotask));
        assert_eq!(TaskKind::NextTick.adhoc_queue(), Some(QueueSelector::NextTick));
        assert_eq!(TaskKind::Fetch.adhoc_queue(), None);
        assert_eq!(TaskKind::Sync.adhoc_queue(), None);
    }

    #[test]
    fn task_kind_parses_authoring_names() {
        assert_eq!("rAF".parse::<TaskKind>().unwrap(), TaskKind::AnimationFrame);
        assert_eq!("settimeout".parse::<TaskKind>().unwrap(), TaskKind::SetTimeout);
        assert!("worker".parse::<TaskKind>().is_err());
    }

    #[test]
    fn server_environment_accepts_node_alias() {
        let env: Environment = serde_yaml::from_str("node").unwrap();
        assert_eq!(env, Environment::Server);
        assert_eq!(Phase::Check.label(env), "Check");
        assert_eq!(Phase::Microtasks.label(Environment::Browser), "Drain Microtasks");
    }
}
