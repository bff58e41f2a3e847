//! Command-line arguments shared by scenario-driven commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};

use loopscope_core::prelude::{Category, Environment, Scenario};

use crate::catalog::DEFAULT_SCENARIO_ID;
use crate::error::ScenarioError;
use crate::Simulator;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentArg {
    Browser,
    #[value(alias = "node")]
    Server,
}

impl From<EnvironmentArg> for Environment {
    fn from(arg: EnvironmentArg) -> Self {
        match arg {
            EnvironmentArg::Browser => Environment::Browser,
            EnvironmentArg::Server => Environment::Server,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryArg {
    Fundamentals,
    Browser,
    Node,
    Tricky,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Fundamentals => Category::Fundamentals,
            CategoryArg::Browser => Category::Browser,
            CategoryArg::Node => Category::Node,
            CategoryArg::Tricky => Category::Tricky,
        }
    }
}

/// Which scenario to run: a catalog id, or a YAML/JSON file.
#[derive(Args, Debug, Clone, Default)]
pub struct ScenarioSource {
    /// Catalog id (defaults to the default scenario)
    pub id: Option<String>,

    /// Scenario file to load instead of a catalog entry
    #[arg(short, long, conflicts_with = "id")]
    pub file: Option<PathBuf>,

    /// Environment for scenarios declared for both
    #[arg(short, long, value_enum)]
    pub environment: Option<EnvironmentArg>,
}

impl ScenarioSource {
    pub fn resolve(&self, simulator: &Simulator) -> Result<Arc<Scenario>, ScenarioError> {
        match (&self.file, &self.id) {
            (Some(path), _) => simulator.load_file(path),
            (None, Some(id)) => simulator.catalog().get(id),
            (None, None) => simulator.catalog().get(DEFAULT_SCENARIO_ID),
        }
    }

    pub fn environment(&self) -> Option<Environment> {
        self.environment.map(Environment::from)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use loopscope_config::LoopscopeConfig;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        source: ScenarioSource,
    }

    #[test]
    fn parses_id_and_environment_alias() {
        let parsed = Harness::try_parse_from(["test", "microtask-chain", "-e", "node"]).unwrap();
        assert_eq!(parsed.source.id.as_deref(), Some("microtask-chain"));
        assert_eq!(parsed.source.environment(), Some(Environment::Server));
    }

    #[test]
    fn id_and_file_conflict() {
        assert!(Harness::try_parse_from(["test", "hello-sync", "--file", "x.yaml"]).is_err());
    }

    #[test]
    fn resolves_default_and_missing_file() {
        let simulator = Simulator::new(LoopscopeConfig::default()).unwrap();
        let default = ScenarioSource::default().resolve(&simulator).unwrap();
        assert_eq!(default.id, DEFAULT_SCENARIO_ID);

        let missing = ScenarioSource {
            file: Some(PathBuf::from("does/not/exist.yaml")),
            ..Default::default()
        };
        assert!(matches!(missing.resolve(&simulator), Err(ScenarioError::Load(_))));
    }
}
