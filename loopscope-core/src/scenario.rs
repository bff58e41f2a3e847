//! Scenario input format.
//!
//! A scenario is a fixed, pre-resolved trace of scheduling primitives plus
//! presentation metadata the engine passes through untouched. Scenarios are
//! authored in YAML (or JSON) using the camelCase vocabulary below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::kinds::{Environment, Phase, QueueSelector};
use crate::state::{AsyncTemplate, FrameTemplate, TaskTemplate};

/// One primitive scheduling action. Unknown `type` tags deserialize to
/// `Unrecognized`, which the executor treats as a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScenarioAction {
    PushStack {
        frame: FrameTemplate,
    },
    PopStack,
    Log {
        message: String,
    },
    EnqueueMicrotask {
        task: TaskTemplate,
    },
    EnqueueMacrotask {
        task: TaskTemplate,
    },
    #[serde(alias = "enqueuePriority")]
    EnqueueNextTick {
        task: TaskTemplate,
    },
    StartAsync {
        operation: AsyncTemplate,
    },
    TickAsync,
    SetPhase {
        phase: Phase,
    },
    DequeueAndRun {
        queue: QueueSelector,
    },
    RunRender,
    Complete,
    #[serde(other)]
    Unrecognized,
}

impl ScenarioAction {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioAction::PushStack { .. } => "pushStack",
            ScenarioAction::PopStack => "popStack",
            ScenarioAction::Log { .. } => "log",
            ScenarioAction::EnqueueMicrotask { .. } => "enqueueMicrotask",
            ScenarioAction::EnqueueMacrotask { .. } => "enqueueMacrotask",
            ScenarioAction::EnqueueNextTick { .. } => "enqueueNextTick",
            ScenarioAction::StartAsync { .. } => "startAsync",
            ScenarioAction::TickAsync => "tickAsync",
            ScenarioAction::SetPhase { .. } => "setPhase",
            ScenarioAction::DequeueAndRun { .. } => "dequeueAndRun",
            ScenarioAction::RunRender => "runRender",
            ScenarioAction::Complete => "complete",
            ScenarioAction::Unrecognized => "unrecognized",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ScenarioAction::Complete)
    }
}

/// Presentation grouping of a scripted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    #[default]
    Execute,
    Enqueue,
    Resolve,
    Complete,
    Log,
    Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    pub action: ScenarioAction,
}

impl ScenarioStep {
    pub fn new(kind: StepKind, action: ScenarioAction) -> Self {
        Self { kind, action }
    }

    pub fn execute(action: ScenarioAction) -> Self {
        Self::new(StepKind::Execute, action)
    }
}

/// Environment a scenario was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredEnvironment {
    Browser,
    #[serde(alias = "node")]
    Server,
    Both,
}

impl DeclaredEnvironment {
    /// Environment to simulate, given the one currently active.
    pub fn resolve(self, active: Environment) -> Environment {
        match self {
            DeclaredEnvironment::Browser => Environment::Browser,
            DeclaredEnvironment::Server => Environment::Server,
            DeclaredEnvironment::Both => active,
        }
    }

    pub fn supports(self, environment: Environment) -> bool {
        self == DeclaredEnvironment::Both || self.resolve(environment) == environment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fundamentals,
    Browser,
    Node,
    Tricky,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(alias = "runtime")]
    pub environment: DeclaredEnvironment,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub expected_output: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Minimal scenario with no presentation metadata, mainly for tests.
    pub fn from_steps(
        id: impl Into<String>,
        environment: DeclaredEnvironment,
        steps: Vec<ScenarioStep>,
    ) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            category: Category::Fundamentals,
            environment,
            code: String::new(),
            expected_output: Vec::new(),
            explanation: String::new(),
            steps,
        }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, CoreError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Loads a scenario file; `.json` files are read as JSON, everything else as YAML.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::FileNotFound(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_yaml_str(&source),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the final step carries the terminal `complete` action.
    pub fn is_terminated(&self) -> bool {
        self.steps
            .last()
            .is_some_and(|step| step.action.is_complete())
    }
}
