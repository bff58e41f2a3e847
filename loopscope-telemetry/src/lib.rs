//! # Loopscope Telemetry
//!
//! Structured logging and Prometheus metrics for the simulator.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
