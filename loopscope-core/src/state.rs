//! ## loopscope-core::state
//! **Runtime State Model**
//!
//! The simulated runtime at one point in time. Every sequence is an
//! `im::Vector`, so cloning a `SimState` into a snapshot shares structure with
//! the live state instead of deep-copying it.
//!
//! ### Invariants:
//! - `call_stack` is LIFO: frames are only pushed to and popped from the tail.
//! - the three task queues are FIFO: append at the tail, dequeue at the head.
//! - `pending_operations` resolve independently; their order carries no meaning
//!   beyond the order in which resolved callbacks are enqueued on one tick.
//! - `history` holds exactly one snapshot per scripted step advanced, in order.

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::events::EventLogEntry;
use crate::ids::EntityId;
use crate::kinds::{Environment, Phase, QueueSelector, Status, TaskKind};

/// Inclusive range of source lines a frame or task points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceRange {
    #[serde(rename = "sourceLineStart", default)]
    pub start: u32,
    #[serde(rename = "sourceLineEnd", default)]
    pub end: u32,
}

impl SourceRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A single-line range.
    pub fn line(line: u32) -> Self {
        Self {
            start: line,
            end: line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: EntityId,
    pub label: String,
    #[serde(flatten)]
    pub range: SourceRange,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub label: String,
    #[serde(flatten)]
    pub range: SourceRange,
    pub created_at_step: u64,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fires_at_step: Option<u64>,
}

/// Task descriptor as authored: no identity and no creation step yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub label: String,
    #[serde(flatten)]
    pub range: SourceRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fires_at_step: Option<u64>,
}

impl TaskTemplate {
    pub fn new(kind: TaskKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            range: SourceRange::default(),
            color: None,
            delay: None,
            fires_at_step: None,
        }
    }

    pub fn with_range(mut self, range: SourceRange) -> Self {
        self.range = range;
        self
    }

    /// Instantiates the template, falling back to `default_color` when no
    /// colour was authored.
    pub fn instantiate(&self, id: EntityId, created_at_step: u64, default_color: &str) -> Task {
        Task {
            id,
            kind: self.kind,
            label: self.label.clone(),
            range: self.range,
            created_at_step,
            color: self
                .color
                .clone()
                .unwrap_or_else(|| default_color.to_string()),
            delay: self.delay,
            fires_at_step: self.fires_at_step,
        }
    }
}

/// Stack frame descriptor as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTemplate {
    pub label: String,
    #[serde(flatten)]
    pub range: SourceRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl FrameTemplate {
    pub fn new(label: impl Into<String>, range: SourceRange) -> Self {
        Self {
            label: label.into(),
            range,
            color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperation {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub label: String,
    #[serde(flatten)]
    pub range: SourceRange,
    /// Percentage in `0.0..=100.0`, derived from the countdown.
    pub progress: f64,
    pub total_steps: u32,
    pub remaining_steps: u32,
    pub callback_task: TaskTemplate,
    pub color: String,
}

/// Pending operation descriptor as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncTemplate {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub label: String,
    #[serde(flatten)]
    pub range: SourceRange,
    pub total_steps: u32,
    /// Defaults to `total_steps` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_steps: Option<u32>,
    pub callback_task: TaskTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// `(total - remaining) / total * 100`; a zero-length countdown is complete.
pub fn progress_percent(total_steps: u32, remaining_steps: u32) -> f64 {
    if total_steps == 0 {
        return 100.0;
    }
    let done = total_steps.saturating_sub(remaining_steps);
    f64::from(done) / f64::from(total_steps) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderStage {
    #[serde(rename = "rAF")]
    AnimationFrame,
    Style,
    Layout,
    Paint,
}

impl RenderStage {
    pub const PIPELINE: [RenderStage; 4] = [
        RenderStage::AnimationFrame,
        RenderStage::Style,
        RenderStage::Layout,
        RenderStage::Paint,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RenderStage::AnimationFrame => "requestAnimationFrame callbacks",
            RenderStage::Style => "Recalculate style",
            RenderStage::Layout => "Layout",
            RenderStage::Paint => "Paint",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStep {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub stage: RenderStage,
    pub label: String,
}

/// Everything a snapshot captures: the runtime state minus history and log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimState {
    pub environment: Environment,
    pub phase: Phase,
    pub status: Status,
    pub call_stack: Vector<StackFrame>,
    pub pending_operations: Vector<AsyncOperation>,
    pub microtask_queue: Vector<Task>,
    pub macrotask_queue: Vector<Task>,
    pub priority_queue: Vector<Task>,
    pub render_steps: Vector<RenderStep>,
    pub console_output: Vector<String>,
    pub current_step: u64,
    pub playback_speed: f64,
    pub active_scenario_id: Option<String>,
    pub highlighted: Option<SourceRange>,
}

impl SimState {
    pub fn new(environment: Environment, playback_speed: f64) -> Self {
        Self {
            environment,
            phase: Phase::Idle,
            status: Status::Idle,
            call_stack: Vector::new(),
            pending_operations: Vector::new(),
            microtask_queue: Vector::new(),
            macrotask_queue: Vector::new(),
            priority_queue: Vector::new(),
            render_steps: Vector::new(),
            console_output: Vector::new(),
            current_step: 0,
            playback_speed,
            active_scenario_id: None,
            highlighted: None,
        }
    }

    pub fn queue(&self, queue: QueueSelector) -> &Vector<Task> {
        match queue {
            QueueSelector::Microtask => &self.microtask_queue,
            QueueSelector::Macrotask => &self.macrotask_queue,
            QueueSelector::NextTick => &self.priority_queue,
        }
    }

    pub fn queue_mut(&mut self, queue: QueueSelector) -> &mut Vector<Task> {
        match queue {
            QueueSelector::Microtask => &mut self.microtask_queue,
            QueueSelector::Macrotask => &mut self.macrotask_queue,
            QueueSelector::NextTick => &mut self.priority_queue,
        }
    }

    pub fn stack_depth(&self) -> usize {
        self.call_stack.len()
    }
}

/// Restorable copy of the simulated state, tagged with the step it represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub step: u64,
    pub state: SimState,
}

/// Full engine-visible state: the simulated runtime plus its audit trail and
/// undo history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
    #[serde(flatten)]
    pub sim: SimState,
    pub event_log: Vector<EventLogEntry>,
    pub history: Vector<Snapshot>,
}

/// Empty browser state at speed 1.0.
impl Default for RuntimeState {
    fn default() -> Self {
        Self::new(Environment::default(), 1.0)
    }
}

impl RuntimeState {
    pub fn new(environment: Environment, playback_speed: f64) -> Self {
        Self {
            sim: SimState::new(environment, playback_speed),
            event_log: Vector::new(),
            history: Vector::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.sim.current_step,
            state: self.sim.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_empty_browser_at_unit_speed() {
        let state = RuntimeState::default();
        assert_eq!(state, RuntimeState::new(Environment::Browser, 1.0));
        assert_eq!(state.sim.status, Status::Idle);
        assert!(state.history.is_empty());
        assert!(state.event_log.is_empty());
    }

    #[test]
    fn progress_is_derived_from_countdown() {
        assert_eq!(progress_percent(4, 4), 0.0);
        assert_eq!(progress_percent(4, 1), 75.0);
        assert_eq!(progress_percent(0, 0), 100.0);
    }

    #[test]
    fn snapshot_excludes_history_and_log() {
        let mut state = RuntimeState::new(Environment::Browser, 1.0);
        state.sim.console_output.push_back("hello".into());
        state.sim.current_step = 3;
        let snapshot = state.snapshot();
        assert_eq!(snapshot.step, 3);
        assert_eq!(snapshot.state, state.sim);
    }

    #[test]
    fn task_template_defaults_colour() {
        let template = TaskTemplate::new(TaskKind::Promise, "then");
        let id = crate::ids::IdGenerator::new().next(crate::ids::IdPrefix::Microtask);
        let task = template.instantiate(id, 2, TaskKind::Promise.canonical_color());
        assert_eq!(task.color, crate::kinds::palette::MICROTASK);
        assert_eq!(task.created_at_step, 2);
    }
}
