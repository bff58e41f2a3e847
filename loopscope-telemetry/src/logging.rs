//! ## loopscope-telemetry::logging
//! **Structured logging with tracing and OpenTelemetry key/values**
//!
//! `RUST_LOG` takes precedence over the configured default level.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Returns `false` if one was already set.
    pub fn init(default_level: &str) -> bool {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
            .try_init()
            .is_ok()
    }

    /// Emits one simulator lifecycle event (scenario loaded, seek, undo...).
    #[inline]
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "simulator_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );
        let _entered = span.enter();
        let fields = metadata
            .iter()
            .map(|kv| format!("{}={}", kv.key, kv.value))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(metadata = %fields, "Simulator event occurred");
    }
}
