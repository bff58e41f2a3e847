//! ## loopscope-engine::dispatcher
//! **Step Dispatcher**
//!
//! Sequences the scripted steps of a loaded scenario through the executor and
//! manages time travel over the resulting states.
//!
//! ### Status machine:
//! - `idle -> running | paused`
//! - `running -> paused`
//! - `paused -> running | completed` (advancing past the end of a finished trace)
//! - `completed` is left only by `reset`, a new load, or `play` restarting the trace
//!
//! ### Invariants:
//! - the scripted-step cursor always equals `current_step`; ad-hoc commands move neither
//! - `history` holds one snapshot per step advanced, tagged `0..current_step`
//! - every command is total: unmet preconditions yield [`Outcome::Ignored`] and leave the
//!   state untouched

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tracing::{debug, info, instrument};

use loopscope_config::{LoopscopeConfig, PlaybackConfig};
use loopscope_core::prelude::*;
use loopscope_telemetry::{EventLogger, MetricsRecorder};

use crate::error::EngineError;

/// Result of one dispatcher command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command changed the state; more scripted steps may follow.
    Applied,
    /// The command ended the trace: `complete` was applied, or the cursor
    /// was already past the last step.
    Finished,
    /// A precondition was not met; nothing changed.
    Ignored,
}

impl Outcome {
    /// Whether the command changed the state, including the step that ended the trace.
    pub fn is_applied(self) -> bool {
        self != Outcome::Ignored
    }

    fn from_changed(changed: bool) -> Self {
        if changed {
            Outcome::Applied
        } else {
            Outcome::Ignored
        }
    }
}

/// Commands accepted by [`StepDispatcher::dispatch`].
#[derive(Debug, Clone)]
pub enum Command {
    Load(Arc<Scenario>),
    SetEnvironment(Environment),
    Reset,
    StepForward,
    Undo,
    Seek(u64),
    Play,
    Pause,
    SetSpeed(f64),
    EnqueueAdHoc {
        kind: TaskKind,
        label: Option<String>,
    },
    TickPending,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Load(_) => "load",
            Command::SetEnvironment(_) => "set_environment",
            Command::Reset => "reset",
            Command::StepForward => "step_forward",
            Command::Undo => "undo",
            Command::Seek(_) => "seek",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::SetSpeed(_) => "set_speed",
            Command::EnqueueAdHoc { .. } => "enqueue_adhoc",
            Command::TickPending => "tick_pending",
        }
    }
}

pub struct StepDispatcher {
    state: RuntimeState,
    scenario: Option<Arc<Scenario>>,
    executor: Executor,
    playback: PlaybackConfig,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl Default for StepDispatcher {
    fn default() -> Self {
        Self::new(Environment::default(), PlaybackConfig::default())
    }
}

impl StepDispatcher {
    pub fn new(environment: Environment, playback: PlaybackConfig) -> Self {
        Self {
            state: RuntimeState::new(environment, playback.default_speed),
            scenario: None,
            executor: Executor::default(),
            playback,
            metrics: None,
        }
    }

    pub fn from_config(config: &LoopscopeConfig) -> Self {
        Self::new(
            config.engine.default_environment,
            config.playback.clone(),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Single entry point mirroring the individual command methods.
    #[instrument(level = "debug", skip_all, fields(command = command.name()))]
    pub fn dispatch(&mut self, command: Command) -> Outcome {
        match command {
            Command::Load(scenario) => self.load_scenario(scenario),
            Command::SetEnvironment(environment) => self.set_environment(environment),
            Command::Reset => self.reset(),
            Command::StepForward => self.step_forward(),
            Command::Undo => self.undo(),
            Command::Seek(step) => self.seek(step),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::SetSpeed(speed) => self.set_speed(speed),
            Command::EnqueueAdHoc { kind, label } => self.enqueue_adhoc(kind, label),
            Command::TickPending => self.tick_pending(),
        }
    }

    // Queries

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.sim.status
    }

    pub fn environment(&self) -> Environment {
        self.state.sim.environment
    }

    pub fn scenario(&self) -> Option<&Arc<Scenario>> {
        self.scenario.as_ref()
    }

    pub fn playback(&self) -> &PlaybackConfig {
        &self.playback
    }

    /// Index of the next scripted step to apply.
    pub fn cursor(&self) -> usize {
        usize::try_from(self.state.sim.current_step).unwrap_or(usize::MAX)
    }

    pub fn total_steps(&self) -> usize {
        self.scenario.as_ref().map_or(0, |scenario| scenario.len())
    }

    pub fn is_finished(&self) -> bool {
        self.scenario.is_some() && self.cursor() >= self.total_steps()
    }

    pub fn can_step_forward(&self) -> bool {
        self.scenario.is_some() && self.status() != Status::Completed && !self.is_finished()
    }

    pub fn can_step_backward(&self) -> bool {
        !self.state.history.is_empty()
    }

    /// Delay before the next automatic step at the current speed.
    pub fn interval(&self) -> Duration {
        self.playback.interval(self.state.sim.playback_speed)
    }

    // Commands

    pub fn load_scenario(&mut self, scenario: impl Into<Arc<Scenario>>) -> Outcome {
        let scenario = scenario.into();
        let environment = scenario.environment.resolve(self.environment());
        self.state = RuntimeState::new(environment, self.state.sim.playback_speed);
        self.state.sim.active_scenario_id = Some(scenario.id.clone());
        self.executor.reset();
        info!(scenario = %scenario.id, %environment, "scenario loaded");

        EventLogger::log_event(
            "scenario_loaded",
            vec![
                KeyValue::new("scenario", scenario.id.clone()),
                KeyValue::new("environment", environment.as_str()),
                KeyValue::new("steps", scenario.len() as i64),
            ],
        );
        self.scenario = Some(scenario);
        Outcome::Applied
    }

    /// Reads a scenario file and loads it.
    pub fn load_scenario_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EngineError> {
        let scenario = Scenario::load_from_file(path)?;
        self.load_scenario(scenario);
        Ok(())
    }

    /// Switches environment, dropping the loaded scenario.
    pub fn set_environment(&mut self, environment: Environment) -> Outcome {
        self.scenario = None;
        self.state = RuntimeState::new(environment, self.state.sim.playback_speed);
        self.executor.reset();
        info!(%environment, "environment switched");
        Outcome::Applied
    }

    /// Fresh state for the current environment. Keeps the scenario and speed.
    pub fn reset(&mut self) -> Outcome {
        let active = self.state.sim.active_scenario_id.take();
        self.state = RuntimeState::new(self.environment(), self.state.sim.playback_speed);
        self.state.sim.active_scenario_id = active;
        self.executor.reset();
        debug!("engine reset");
        Outcome::Applied
    }

    /// Manual step: pauses playback, then advances one scripted step.
    pub fn step_forward(&mut self) -> Outcome {
        if self.scenario.is_none() || self.status() == Status::Completed {
            debug!(status = ?self.status(), "step forward ignored");
            return Outcome::Ignored;
        }
        self.state.sim.status = Status::Paused;
        self.advance()
    }

    /// Applies the next scripted step without touching the playback status,
    /// except at the end of the trace.
    pub fn advance(&mut self) -> Outcome {
        let Some(scenario) = self.scenario.clone() else {
            debug!("advance ignored: no scenario loaded");
            return Outcome::Ignored;
        };
        if self.status() == Status::Completed {
            debug!("advance rejected: trace already completed");
            return Outcome::Ignored;
        }

        let Some(step) = scenario.steps.get(self.cursor()) else {
            self.state.sim.status = if scenario.is_terminated() {
                Status::Completed
            } else {
                Status::Paused
            };
            debug!(status = ?self.status(), "end of trace");
            return Outcome::Finished;
        };

        let snapshot = self.state.snapshot();
        self.state.history.push_back(snapshot);
        self.state.sim.current_step += 1;
        self.apply(&step.action);

        if let Some(metrics) = &self.metrics {
            metrics.inc_steps_applied();
        }

        if step.action.is_complete() {
            self.state.sim.status = Status::Paused;
            EventLogger::log_event(
                "scenario_completed",
                vec![
                    KeyValue::new("scenario", scenario.id.clone()),
                    KeyValue::new("steps", self.state.sim.current_step as i64),
                ],
            );
            return Outcome::Finished;
        }
        Outcome::Applied
    }

    /// Restores the most recent snapshot. The event log and playback speed stay live.
    pub fn undo(&mut self) -> Outcome {
        let Some(snapshot) = self.state.history.pop_back() else {
            debug!("undo ignored: empty history");
            return Outcome::Ignored;
        };
        self.restore(snapshot.state);
        if let Some(metrics) = &self.metrics {
            metrics.inc_steps_undone();
        }
        debug!(step = self.state.sim.current_step, "undo");
        Outcome::Applied
    }

    /// Travels to the state after `step` steps and discards everything later.
    pub fn seek(&mut self, step: u64) -> Outcome {
        let Some(index) = self
            .state
            .history
            .iter()
            .position(|snapshot| snapshot.step == step)
        else {
            debug!(step, "seek ignored: no snapshot for step");
            return Outcome::Ignored;
        };

        let snapshot = self.state.history[index].clone();
        self.state.history.truncate(index);
        self.state.event_log.retain(|entry| entry.step <= step);
        self.restore(snapshot.state);

        if let Some(metrics) = &self.metrics {
            metrics.inc_seeks();
        }
        EventLogger::log_event(
            "seek",
            vec![
                KeyValue::new("step", step as i64),
                KeyValue::new("events", self.state.event_log.len() as i64),
            ],
        );
        Outcome::Applied
    }

    /// Starts playback. A completed or exhausted trace restarts from scratch.
    pub fn play(&mut self) -> Outcome {
        if self.scenario.is_none() || self.status() == Status::Running {
            return Outcome::Ignored;
        }
        if self.status() == Status::Completed || self.is_finished() {
            self.reset();
        }
        self.state.sim.status = Status::Running;
        Outcome::Applied
    }

    pub fn pause(&mut self) -> Outcome {
        if self.status() != Status::Running {
            debug!(status = ?self.status(), "pause ignored");
            return Outcome::Ignored;
        }
        self.state.sim.status = Status::Paused;
        Outcome::Applied
    }

    /// Sets the playback multiplier, clamped to the configured range.
    pub fn set_speed(&mut self, speed: f64) -> Outcome {
        let Some(speed) = self.playback.clamp_speed(speed) else {
            debug!(speed, "speed ignored");
            return Outcome::Ignored;
        };
        self.state.sim.playback_speed = speed;
        Outcome::Applied
    }

    /// Enqueues a task outside the scripted trace: no snapshot, no step.
    pub fn enqueue_adhoc(&mut self, kind: TaskKind, label: Option<String>) -> Outcome {
        let Some(queue) = kind.adhoc_queue() else {
            debug!(%kind, "task kind has no ad-hoc queue");
            return Outcome::Ignored;
        };
        let label = label.unwrap_or_else(|| format!("{kind} callback"));
        let task = TaskTemplate::new(kind, label);
        let action = match queue {
            QueueSelector::Microtask => ScenarioAction::EnqueueMicrotask { task },
            QueueSelector::Macrotask => ScenarioAction::EnqueueMacrotask { task },
            QueueSelector::NextTick => ScenarioAction::EnqueueNextTick { task },
        };
        self.apply(&action);
        if let Some(metrics) = &self.metrics {
            metrics.inc_adhoc_tasks();
        }
        Outcome::Applied
    }

    /// Ticks pending operations outside the scripted trace.
    pub fn tick_pending(&mut self) -> Outcome {
        let before = self.state.sim.pending_operations.clone();
        self.apply(&ScenarioAction::TickAsync);
        Outcome::from_changed(before != self.state.sim.pending_operations)
    }

    fn apply(&mut self, action: &ScenarioAction) {
        let current = std::mem::take(&mut self.state);
        self.state = self.executor.apply(current, action);
    }

    fn restore(&mut self, mut sim: SimState) {
        sim.playback_speed = self.state.sim.playback_speed;
        sim.status = Status::Paused;
        self.state.sim = sim;
    }
}
