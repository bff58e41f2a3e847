//! # loopscope-engine
//!
//! Step dispatcher and playback scheduler. The dispatcher owns the runtime
//! state exclusively; the scheduler is the only source of asynchronous
//! suspension between steps.

pub mod dispatcher;
pub mod error;
pub mod playback;

pub use dispatcher::{Command, Outcome, StepDispatcher};
pub use error::EngineError;
pub use playback::PlaybackScheduler;

pub mod prelude {
    pub use crate::dispatcher::{Command, Outcome, StepDispatcher};
    pub use crate::error::EngineError;
    pub use crate::playback::PlaybackScheduler;
}
