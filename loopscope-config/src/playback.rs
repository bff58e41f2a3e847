//! Playback scheduler configuration.
//!
//! The effective interval between automatic steps is
//! `base_interval_ms / speed`, with speed clamped to `[min_speed, max_speed]`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
#[validate(schema(function = "validation::validate_speed_bounds"))]
pub struct PlaybackConfig {
    /// Interval between automatic steps at speed 1.0.
    #[validate(range(min = 10, max = 60000))]
    pub base_interval_ms: u64,

    #[validate(range(exclusive_min = 0.0))]
    pub default_speed: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub min_speed: f64,

    #[validate(range(exclusive_min = 0.0, max = 64.0))]
    pub max_speed: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            default_speed: 1.0,
            min_speed: 0.25,
            max_speed: 4.0,
        }
    }
}

impl PlaybackConfig {
    /// Clamps a requested speed into the configured range. Non-finite or
    /// non-positive requests yield `None`. Inverted bounds are swapped, so an
    /// unvalidated config never panics.
    pub fn clamp_speed(&self, speed: f64) -> Option<f64> {
        if !speed.is_finite() || speed <= 0.0 {
            return None;
        }
        let low = self.min_speed.min(self.max_speed);
        let high = self.max_speed.max(self.min_speed);
        Some(speed.max(low).min(high))
    }

    /// Wall-clock delay between automatic steps at `speed`.
    pub fn interval(&self, speed: f64) -> Duration {
        let speed = self.clamp_speed(speed).unwrap_or(self.default_speed);
        Duration::from_secs_f64(self.base_interval_ms as f64 / 1000.0 / speed)
    }
}
