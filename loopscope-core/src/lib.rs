//! # loopscope-core
//!
//! Runtime state model and action executor of a deterministic event loop
//! simulator. Nothing in this crate reads wall-clock time or randomness: a
//! scenario applied to a fresh state always yields the same state and log.
//!
//! ### Key Submodules:
//! - `state`: call stack, task queues, pending operations and snapshots on `im` vectors
//! - `executor`: applies one primitive scheduling action to a state
//! - `scenario`: the YAML/JSON trace format consumed by the engine
//! - `time`: logical clock stamping event log entries

pub mod error;
pub mod events;
pub mod executor;
pub mod ids;
pub mod kinds;
pub mod scenario;
pub mod state;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::executor::Executor;
    pub use crate::ids::*;
    pub use crate::kinds::*;
    pub use crate::scenario::*;
    pub use crate::state::*;
    pub use crate::time::VirtualClock;
}

pub use error::CoreError;
pub use executor::Executor;
