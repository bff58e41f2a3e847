//! Scenario catalog configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Extra directory of `*.yaml`/`*.json` scenarios loaded after the built-ins.
    pub directory: Option<PathBuf>,

    /// Include the scenarios compiled into the binary.
    pub include_builtin: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            include_builtin: true,
        }
    }
}
