use std::path::PathBuf;

use thiserror::Error;

use loopscope_core::CoreError;

use crate::validation::ValidationIssue;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Scenario directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to load scenario: {0}")]
    Load(#[from] CoreError),

    #[error("Scenario '{id}' failed validation:\n{}", format_issues(.issues))]
    Invalid {
        id: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}
