//! ## loopscope-core::time
//! **Logical clock for event log timestamps**
//!
//! The engine never reads wall-clock time: every recorded event carries a
//! logical timestamp taken from a `VirtualClock` owned by one engine
//! instance, so replays of the same trace produce identical logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic logical clock, shareable between the dispatcher and its scheduler.
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    offset: Arc<AtomicU64>,
}

impl VirtualClock {
    /// Creates a clock starting at `origin`.
    pub fn new(origin: u64) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(origin)),
        }
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    /// Advances by `units` and returns the new reading.
    #[inline]
    pub fn advance(&self, units: u64) -> u64 {
        self.offset.fetch_add(units, Ordering::AcqRel) + units
    }

    /// Rewinds to zero. Only called at a full reset boundary.
    pub fn reset(&self) {
        self.offset.store(0, Ordering::Release);
    }
}
