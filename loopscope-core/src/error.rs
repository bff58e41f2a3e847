use std::path::PathBuf;

use thiserror::Error;

/// Errors at the scenario input boundary. Engine commands themselves never fail.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Scenario file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Scenario YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Scenario JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
