//! Event types for the chaos event system
//!
//! Provides the shared event enum and the EventBus used to fan events out to
//! log sinks and SSE clients.

mod queue_types;

pub use queue_types::QueueChangeTrigger;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::Difficulty;

/// Chaos event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChaosEvent {
    /// A new pool generation was published
    PoolRebuilt {
        /// Generation number of the published pool
        generation: u64,
        /// Songs with at least one valid difficulty
        valid_count: usize,
        /// Songs that can be requested from chat
        requestable_count: usize,
        /// Wall time spent rebuilding
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A rebuild failed; the previous generation stays published
    PoolRebuildFailed {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A chat request was accepted into the queue
    RequestQueued {
        queue_entry_id: Uuid,
        level_id: String,
        difficulty: Difficulty,
        /// Start offset override in seconds
        start_time_secs: Option<u32>,
        /// Chat user who asked for the song
        source: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A chat request was turned down
    RequestRejected {
        source: String,
        /// User-facing reason
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents changed
    QueueChanged {
        /// Queue entry ids in queue order
        queue: Vec<Uuid>,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ChaosEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ChaosEvent::PoolRebuilt { .. } => "PoolRebuilt",
            ChaosEvent::PoolRebuildFailed { .. } => "PoolRebuildFailed",
            ChaosEvent::RequestQueued { .. } => "RequestQueued",
            ChaosEvent::RequestRejected { .. } => "RequestRejected",
            ChaosEvent::QueueChanged { .. } => "QueueChanged",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use chaos_common::events::{ChaosEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ChaosEvent::PoolRebuildFailed {
///     reason: "metadata unavailable".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChaosEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ChaosEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ChaosEvent,
    ) -> Result<usize, broadcast::error::SendError<ChaosEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ChaosEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
