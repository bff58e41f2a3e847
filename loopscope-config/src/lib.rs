//! # Loopscope Configuration System
//!
//! Hierarchical configuration for the simulator engine, playback scheduler,
//! scenario catalog and telemetry.
//!
//! ## Features
//! - **Layered sources**: defaults, YAML files, then `LOOPSCOPE_*` variables
//! - **Validation**: every section is checked with `validator` after merging

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod catalog;
mod engine;
mod error;
mod playback;
mod telemetry;
mod validation;

pub use catalog::CatalogConfig;
pub use engine::EngineConfig;
pub use error::ConfigError;
pub use playback::PlaybackConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/loopscope.yaml";
const ENV_PREFIX: &str = "LOOPSCOPE_";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
#[serde(default)]
pub struct LoopscopeConfig {
    #[validate(nested)]
    pub engine: EngineConfig,

    #[validate(nested)]
    pub playback: PlaybackConfig,

    #[validate(nested)]
    pub catalog: CatalogConfig,

    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl LoopscopeConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/loopscope.yaml`, if present.
    /// 3. `config/<LOOPSCOPE_ENV>.yaml` (default `local`), if present.
    /// 4. `LOOPSCOPE_*` environment variables, `__` separating nested keys.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(LoopscopeConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("LOOPSCOPE_ENV").unwrap_or_else(|_| "local".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file, still honouring environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract(
            Figment::from(Serialized::defaults(LoopscopeConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopscope_core::kinds::Environment;

    #[test]
    fn full_config_validation() {
        let config = LoopscopeConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn layered_files_and_environment() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/loopscope.yaml",
                "engine:\n  default_environment: node\nplayback:\n  base_interval_ms: 500\n",
            )?;
            jail.create_file("config/ci.yaml", "engine:\n  strict_validation: true\n")?;
            jail.set_env("LOOPSCOPE_ENV", "ci");
            jail.set_env("LOOPSCOPE_PLAYBACK__MAX_SPEED", "8.0");

            let config = LoopscopeConfig::load().expect("layered config loads");
            assert_eq!(config.engine.default_environment, Environment::Server);
            assert!(config.engine.strict_validation);
            assert!(config.engine.validate_scenarios);
            assert_eq!(config.playback.base_interval_ms, 500);
            assert_eq!(config.playback.max_speed, 8.0);
            assert_eq!(config.telemetry.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_reported_per_field() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "bad.yaml",
                "playback:\n  base_interval_ms: 1\ntelemetry:\n  log_level: loud\n",
            )?;
            let err = LoopscopeConfig::load_from_path("bad.yaml").unwrap_err();
            let message = err.to_string();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(message.contains("playback"), "{message}");
            assert!(message.contains("invalid_log_level"), "{message}");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = LoopscopeConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
