//! ## loopscope-core::events
//! **Append-only audit trail of executed primitives**
//!
//! One `EventLogEntry` is recorded per primitive that changed the simulated
//! runtime. The log is never rolled back by undo; only a seek truncates it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;
use crate::kinds::QueueSelector;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventAction {
    Enqueue,
    Dequeue,
    Push,
    Pop,
    Complete,
    Start,
    Log,
    Phase,
}

/// Where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventTarget {
    CallStack,
    MicrotaskQueue,
    MacrotaskQueue,
    PriorityQueue,
    PendingOperations,
    Console,
    Render,
    EventLoop,
}

impl From<QueueSelector> for EventTarget {
    fn from(queue: QueueSelector) -> Self {
        match queue {
            QueueSelector::Microtask => EventTarget::MicrotaskQueue,
            QueueSelector::Macrotask => EventTarget::MacrotaskQueue,
            QueueSelector::NextTick => EventTarget::PriorityQueue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    /// Index of the scripted step that produced the entry.
    pub step: u64,
    /// Logical timestamp from the engine's virtual clock.
    pub timestamp: u64,
    pub action: EventAction,
    pub target: EventTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EventLogEntry {
    /// Rendering of the entry without identity or timestamp, stable across
    /// replays of the same trace.
    pub fn canonical(&self) -> String {
        format!(
            "{}:{:?}:{:?}:{}:{}",
            self.step,
            self.action,
            self.target,
            self.task_label.as_deref().unwrap_or(""),
            self.message.as_deref().unwrap_or("")
        )
    }
}

impl fmt::Display for EventLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[step {:>3}] {:?} {:?}", self.step, self.action, self.target)?;
        if let Some(label) = &self.task_label {
            write!(f, " {label}")?;
        }
        if let Some(message) = &self.message {
            write!(f, " \"{message}\"")?;
        }
        Ok(())
    }
}
