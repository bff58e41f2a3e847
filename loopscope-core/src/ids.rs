//! Identity generation scoped to one engine instance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of a frame, task, pending operation or render step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefix of a generated identity, naming what the identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Frame,
    Microtask,
    Macrotask,
    NextTick,
    Async,
    Callback,
    Render,
}

impl IdPrefix {
    fn as_str(self) -> &'static str {
        match self {
            IdPrefix::Frame => "frame",
            IdPrefix::Microtask => "microtask",
            IdPrefix::Macrotask => "macrotask",
            IdPrefix::NextTick => "nexttick",
            IdPrefix::Async => "async",
            IdPrefix::Callback => "callback",
            IdPrefix::Render => "render",
        }
    }
}

/// Sequential identity source. Owned by a single dispatcher; reset only when
/// that dispatcher loads a scenario or resets, which discards every identity
/// issued before.
#[derive(Debug, Default)]
pub struct IdGenerator {
    issued: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, prefix: IdPrefix) -> EntityId {
        self.issued += 1;
        EntityId(format!("{}-{}", prefix.as_str(), self.issued))
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn reset(&mut self) {
        self.issued = 0;
    }
}
