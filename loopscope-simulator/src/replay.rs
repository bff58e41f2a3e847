//! Headless replay.
//!
//! Runs a scenario from a fresh load to the end of its trace and summarises the
//! run. The digest covers the identity-free event log and the console output,
//! so two replays of the same trace always agree on it.

use std::sync::Arc;
use std::time::Instant;

use blake3::Hasher;
use serde::Serialize;
use tracing::{debug, instrument};

use loopscope_config::PlaybackConfig;
use loopscope_core::prelude::*;
use loopscope_engine::{Outcome, StepDispatcher};
use loopscope_telemetry::MetricsRecorder;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub scenario_id: String,
    pub environment: Environment,
    pub steps_applied: u64,
    pub events_recorded: usize,
    pub console_output: Vec<String>,
    pub final_status: Status,
    /// Hex-encoded BLAKE3 digest of the run.
    pub digest: String,
}

/// Expected versus actual console output of one replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub scenario_id: String,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

impl ReplayReport {
    pub fn verify(&self, scenario: &Scenario) -> Verification {
        Verification {
            scenario_id: scenario.id.clone(),
            expected: scenario.expected_output.clone(),
            actual: self.console_output.clone(),
        }
    }
}

/// Digest of a finished run: one line per event log entry, then one per
/// console line.
pub fn state_digest(state: &RuntimeState) -> String {
    let mut hasher = Hasher::new();
    for entry in state.event_log.iter() {
        hasher.update(entry.canonical().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"--\n");
    for line in state.sim.console_output.iter() {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize().as_bytes())
}

/// Steps `dispatcher` until its trace ends. Returns the number of steps applied.
pub fn run_to_end(dispatcher: &mut StepDispatcher) -> u64 {
    let start = dispatcher.state().sim.current_step;
    while dispatcher.step_forward() == Outcome::Applied {}
    dispatcher.state().sim.current_step - start
}

/// Replays `scenario` in `environment` (used when it declares both).
#[instrument(level = "debug", skip_all, fields(scenario = %scenario.id))]
pub fn replay(
    scenario: Arc<Scenario>,
    environment: Environment,
    metrics: Option<&MetricsRecorder>,
) -> ReplayReport {
    let started = Instant::now();
    let mut dispatcher = StepDispatcher::new(environment, PlaybackConfig::default());
    dispatcher.load_scenario(Arc::clone(&scenario));
    run_to_end(&mut dispatcher);

    let state = dispatcher.state();
    let report = ReplayReport {
        scenario_id: scenario.id.clone(),
        environment: state.sim.environment,
        steps_applied: state.sim.current_step,
        events_recorded: state.event_log.len(),
        console_output: state.sim.console_output.iter().cloned().collect(),
        final_status: state.sim.status,
        digest: state_digest(state),
    };

    if let Some(metrics) = metrics {
        metrics.observe_replay_micros(started.elapsed().as_micros() as f64);
    }
    debug!(digest = %report.digest, steps = report.steps_applied, "replay finished");
    report
}
