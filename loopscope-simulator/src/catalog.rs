//! ## loopscope-simulator::catalog
//! **Scenario catalog**
//!
//! Built-in scenarios are compiled in from `scenarios/*.yaml`. A configured
//! directory may add more, or replace a built-in by reusing its id.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use loopscope_config::{CatalogConfig, EngineConfig};
use loopscope_core::prelude::*;

use crate::error::ScenarioError;
use crate::validation;

/// Scenario loaded when none is requested.
pub const DEFAULT_SCENARIO_ID: &str = "settimeout-vs-promise";

const BUILTIN: &[(&str, &str)] = &[
    ("hello-sync", include_str!("../../scenarios/hello-sync.yaml")),
    (
        "settimeout-vs-promise",
        include_str!("../../scenarios/settimeout-vs-promise.yaml"),
    ),
    (
        "async-await-basics",
        include_str!("../../scenarios/async-await-basics.yaml"),
    ),
    (
        "nested-settimeout",
        include_str!("../../scenarios/nested-settimeout.yaml"),
    ),
    ("microtask-chain", include_str!("../../scenarios/microtask-chain.yaml")),
    (
        "nexttick-vs-promise",
        include_str!("../../scenarios/nexttick-vs-promise.yaml"),
    ),
    (
        "promise-in-timeout",
        include_str!("../../scenarios/promise-in-timeout.yaml"),
    ),
    ("queuemicrotask", include_str!("../../scenarios/queuemicrotask.yaml")),
    ("multiple-awaits", include_str!("../../scenarios/multiple-awaits.yaml")),
    ("promise-executor", include_str!("../../scenarios/promise-executor.yaml")),
    (
        "setimmediate-vs-timeout",
        include_str!("../../scenarios/setimmediate-vs-timeout.yaml"),
    ),
    ("mixed-async", include_str!("../../scenarios/mixed-async.yaml")),
    (
        "promise-race-condition",
        include_str!("../../scenarios/promise-race-condition.yaml"),
    ),
    ("raf-vs-timeout", include_str!("../../scenarios/raf-vs-timeout.yaml")),
];

/// How scenarios are checked when they enter the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Off,
    Lenient,
    Strict,
}

impl From<&EngineConfig> for ValidationMode {
    fn from(config: &EngineConfig) -> Self {
        match (config.validate_scenarios, config.strict_validation) {
            (false, _) => ValidationMode::Off,
            (true, false) => ValidationMode::Lenient,
            (true, true) => ValidationMode::Strict,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    scenarios: Vec<Arc<Scenario>>,
    validation: ValidationMode,
    environment: Environment,
}

impl Catalog {
    pub fn empty(validation: ValidationMode, environment: Environment) -> Self {
        Self {
            scenarios: Vec::new(),
            validation,
            environment,
        }
    }

    /// The compiled-in scenarios, validated leniently.
    pub fn builtin() -> Result<Self, ScenarioError> {
        let mut catalog = Self::empty(ValidationMode::Lenient, Environment::Browser);
        catalog.add_builtin()?;
        Ok(catalog)
    }

    pub fn from_config(catalog: &CatalogConfig, engine: &EngineConfig) -> Result<Self, ScenarioError> {
        let mut this = Self::empty(engine.into(), engine.default_environment);
        if catalog.include_builtin {
            this.add_builtin()?;
        }
        if let Some(directory) = &catalog.directory {
            this.load_dir(directory)?;
        }
        info!(scenarios = this.len(), "scenario catalog ready");
        Ok(this)
    }

    fn add_builtin(&mut self) -> Result<(), ScenarioError> {
        for (id, source) in BUILTIN {
            let scenario = Scenario::from_yaml_str(source)?;
            debug_assert_eq!(scenario.id, *id);
            self.insert(scenario)?;
        }
        Ok(())
    }

    /// Loads every `*.yaml`, `*.yml` and `*.json` file in `directory`, in file name order.
    pub fn load_dir<P: AsRef<Path>>(&mut self, directory: P) -> Result<usize, ScenarioError> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(ScenarioError::DirectoryNotFound(directory.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            let is_scenario = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "yaml" | "yml" | "json"));
            if is_scenario {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.insert(Scenario::load_from_file(path)?)?;
        }
        debug!(directory = %directory.display(), loaded = paths.len(), "scenario directory loaded");
        Ok(paths.len())
    }

    /// Adds a scenario, replacing any existing one with the same id.
    pub fn insert(&mut self, scenario: Scenario) -> Result<Arc<Scenario>, ScenarioError> {
        match self.validation {
            ValidationMode::Off => {}
            mode => {
                let warnings =
                    validation::check(&scenario, self.environment, mode == ValidationMode::Strict)?;
                for issue in &warnings {
                    warn!(scenario = %scenario.id, %issue, "scenario accepted with warning");
                }
            }
        }

        let scenario = Arc::new(scenario);
        match self.scenarios.iter_mut().find(|s| s.id == scenario.id) {
            Some(existing) => {
                info!(scenario = %scenario.id, "replacing scenario");
                *existing = Arc::clone(&scenario);
            }
            None => self.scenarios.push(Arc::clone(&scenario)),
        }
        Ok(scenario)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Scenario>, ScenarioError> {
        self.scenarios
            .iter()
            .find(|scenario| scenario.id == id)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownScenario(id.to_string()))
    }

    pub fn default_scenario(&self) -> Result<Arc<Scenario>, ScenarioError> {
        self.get(DEFAULT_SCENARIO_ID)
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Arc<Scenario>> {
        self.scenarios
            .iter()
            .filter(move |scenario| scenario.category == category)
    }

    /// Scenarios declared for `environment` or for both environments.
    pub fn for_environment(&self, environment: Environment) -> impl Iterator<Item = &Arc<Scenario>> {
        self.scenarios
            .iter()
            .filter(move |scenario| scenario.environment.supports(environment))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Scenario>> {
        self.scenarios.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn builtin_catalog_is_complete_and_ordered() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.len(), BUILTIN.len());
        assert_eq!(catalog.ids()[0], "hello-sync");
        assert!(catalog.default_scenario().is_ok());
        assert!(matches!(
            catalog.get("no-such-scenario"),
            Err(ScenarioError::UnknownScenario(_))
        ));
    }

    #[test]
    fn lookup_by_category_and_environment() {
        let catalog = Catalog::builtin().unwrap();
        let node: Vec<_> = catalog.by_category(Category::Node).map(|s| s.id.as_str()).collect();
        assert_eq!(node, vec!["nexttick-vs-promise", "setimmediate-vs-timeout"]);

        assert!(catalog
            .for_environment(Environment::Server)
            .all(|s| s.environment != DeclaredEnvironment::Browser));
        assert!(catalog
            .for_environment(Environment::Browser)
            .any(|s| s.id == "raf-vs-timeout"));
        assert!(!catalog
            .for_environment(Environment::Server)
            .any(|s| s.id == "raf-vs-timeout"));
    }

    #[test]
    fn insert_replaces_same_id() {
        let mut catalog = Catalog::builtin().unwrap();
        let before = catalog.len();
        let replacement = Scenario::from_steps(
            "hello-sync",
            DeclaredEnvironment::Both,
            vec![ScenarioStep::new(StepKind::Complete, ScenarioAction::Complete)],
        );
        catalog.insert(replacement).unwrap();
        assert_eq!(catalog.len(), before);
        assert_eq!(catalog.get("hello-sync").unwrap().len(), 1);
    }

    #[test]
    #[traced_test]
    fn strict_catalog_rejects_warnings() {
        let mut catalog = Catalog::empty(ValidationMode::Strict, Environment::Browser);
        let sloppy = Scenario::from_steps(
            "sloppy",
            DeclaredEnvironment::Both,
            vec![
                ScenarioStep::execute(ScenarioAction::PopStack),
                ScenarioStep::new(StepKind::Complete, ScenarioAction::Complete),
            ],
        );
        assert!(matches!(
            catalog.insert(sloppy.clone()),
            Err(ScenarioError::Invalid { .. })
        ));

        let mut lenient = Catalog::empty(ValidationMode::Lenient, Environment::Browser);
        assert!(lenient.insert(sloppy).is_ok());
        assert!(logs_contain("scenario accepted with warning"));
        assert!(logs_contain("stack_underflow"));
    }

    #[test]
    fn missing_directory_is_reported() {
        let mut catalog = Catalog::empty(ValidationMode::Off, Environment::Browser);
        assert!(matches!(
            catalog.load_dir("does/not/exist"),
            Err(ScenarioError::DirectoryNotFound(_))
        ));
    }
}
