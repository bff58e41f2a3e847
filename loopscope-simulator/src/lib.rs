//! ## loopscope-simulator
//! **Scenario catalog and headless replay**
//!
//! Ties the configured scenario catalog to fresh step dispatchers. Used by the
//! `loopscope` binary and by tests that need real scenarios.
//!
//! ### Key components:
//! - **Catalog:** built-in scenarios plus an optional directory, looked up by
//!   id, category or environment.
//! - **Validation:** a dry run that flags structural defects and stack or
//!   queue misuse before a scenario is accepted.
//! - **Replay:** runs a scenario to the end of its trace and digests the run.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use loopscope_config::LoopscopeConfig;
use loopscope_core::prelude::*;
use loopscope_engine::StepDispatcher;
use loopscope_telemetry::MetricsRecorder;

pub mod catalog;
pub mod cli;
pub mod error;
pub mod replay;
pub mod validation;

pub use catalog::{Catalog, ValidationMode, DEFAULT_SCENARIO_ID};
pub use error::ScenarioError;
pub use replay::{replay, state_digest, ReplayReport, Verification};
pub use validation::{Severity, ValidationIssue};

pub struct Simulator {
    config: LoopscopeConfig,
    catalog: Catalog,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl Simulator {
    pub fn new(config: LoopscopeConfig) -> Result<Self, ScenarioError> {
        let catalog = Catalog::from_config(&config.catalog, &config.engine)?;
        Ok(Self {
            config,
            catalog,
            metrics: None,
        })
    }

    /// Records step and replay metrics into `metrics` from now on.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &LoopscopeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRecorder>> {
        self.metrics.as_ref()
    }

    /// An idle dispatcher in the configured default environment.
    pub fn dispatcher(&self) -> StepDispatcher {
        let dispatcher = StepDispatcher::from_config(&self.config);
        match &self.metrics {
            Some(metrics) => dispatcher.with_metrics(Arc::clone(metrics)),
            None => dispatcher,
        }
    }

    /// A dispatcher with `scenario` loaded, optionally forcing the
    /// environment of a scenario declared for both.
    pub fn dispatcher_with(
        &self,
        scenario: Arc<Scenario>,
        environment: Option<Environment>,
    ) -> StepDispatcher {
        let mut dispatcher = self.dispatcher();
        if let Some(environment) = environment {
            dispatcher.set_environment(environment);
        }
        dispatcher.load_scenario(scenario);
        dispatcher
    }

    /// Reads a scenario file and checks it the way the catalog would. The
    /// catalog itself is left untouched.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Scenario>, ScenarioError> {
        let path = path.as_ref();
        let scenario = Scenario::load_from_file(path)?;
        let mode = ValidationMode::from(&self.config.engine);
        if mode != ValidationMode::Off {
            let warnings = validation::check(
                &scenario,
                self.config.engine.default_environment,
                mode == ValidationMode::Strict,
            )?;
            debug!(path = %path.display(), warnings = warnings.len(), "scenario file checked");
        }
        Ok(Arc::new(scenario))
    }

    /// Replays `scenario`; `environment` only matters for scenarios declared
    /// for both and defaults to the configured one.
    pub fn replay(&self, scenario: Arc<Scenario>, environment: Option<Environment>) -> ReplayReport {
        let environment = environment.unwrap_or(self.config.engine.default_environment);
        replay::replay(scenario, environment, self.metrics.as_deref())
    }

    pub fn replay_id(&self, id: &str) -> Result<ReplayReport, ScenarioError> {
        Ok(self.replay(self.catalog.get(id)?, None))
    }
}
