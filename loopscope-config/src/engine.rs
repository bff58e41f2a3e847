//! Step dispatcher configuration.

use loopscope_core::kinds::Environment;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Environment a fresh engine simulates (`browser`, `server` or `node`).
    pub default_environment: Environment,

    /// Check scenarios for structural problems before loading them.
    pub validate_scenarios: bool,

    /// Treat validation warnings as errors.
    pub strict_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_environment: Environment::Browser,
            validate_scenarios: true,
            strict_validation: false,
        }
    }
}
