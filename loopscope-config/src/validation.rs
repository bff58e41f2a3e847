//! Custom validation functions for configuration.

use validator::ValidationError;

use crate::playback::PlaybackConfig;

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(?i)(trace|debug|info|warn|error)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(level) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that the default speed lies within the configured speed bounds.
pub fn validate_speed_bounds(playback: &PlaybackConfig) -> Result<(), ValidationError> {
    if playback.min_speed <= playback.default_speed && playback.default_speed <= playback.max_speed
    {
        Ok(())
    } else {
        let mut error = ValidationError::new("speed_out_of_bounds");
        error.message = Some("min_speed <= default_speed <= max_speed must hold".into());
        Err(error)
    }
}
