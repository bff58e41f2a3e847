use thiserror::Error;
use tokio::task::JoinError;

use loopscope_core::CoreError;

/// Errors at the engine's I/O boundary. Dispatcher commands themselves never fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Scenario error: {0}")]
    Scenario(#[from] CoreError),

    #[error("Playback task failed: {0}")]
    Playback(String),
}

impl From<JoinError> for EngineError {
    fn from(err: JoinError) -> Self {
        EngineError::Playback(err.to_string())
    }
}
