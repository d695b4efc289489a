//! Validation events and the broadcast bus carrying them
//!
//! Provides the validation event definitions and the EventBus used to fan
//! them out to SSE clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Validation session events
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValidationEvent {
    /// Session created and remote fetch about to start
    SessionStarted {
        session_id: Uuid,
        document_id: u64,
        campaign_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress changed (synthetic while fetching, 100 on success, 0 on failure)
    ProgressUpdate {
        session_id: Uuid,
        /// Session state name (`pending`, `fetching`, ...)
        state: String,
        /// 0-100
        percent: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Report produced and stored
    SessionCompleted {
        session_id: Uuid,
        document_id: u64,
        freshness: u64,
        matched_rows: usize,
        unmatched_rows: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session failed; no report was produced
    SessionFailed {
        session_id: Uuid,
        document_id: u64,
        /// `timeout`, `transport-error`, `cancelled` or `no-data`
        reason: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ValidationEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ValidationEvent::SessionStarted { .. } => "SessionStarted",
            ValidationEvent::ProgressUpdate { .. } => "ProgressUpdate",
            ValidationEvent::SessionCompleted { .. } => "SessionCompleted",
            ValidationEvent::SessionFailed { .. } => "SessionFailed",
        }
    }

    /// Session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            ValidationEvent::SessionStarted { session_id, .. }
            | ValidationEvent::ProgressUpdate { session_id, .. }
            | ValidationEvent::SessionCompleted { session_id, .. }
            | ValidationEvent::SessionFailed { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast bus for validation events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ValidationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Bus buffering up to `capacity` events per subscriber; slow subscribers lag
    ///
    /// ```
    /// use ordr_common::events::EventBus;
    ///
    /// let bus = EventBus::new(100);
    /// assert_eq!(bus.capacity(), 100);
    /// assert_eq!(bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Receiver for events sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ValidationEvent> {
        self.tx.subscribe()
    }

    /// Fails when nobody is subscribed
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ValidationEvent,
    ) -> Result<usize, broadcast::error::SendError<ValidationEvent>> {
        self.tx.send(event)
    }

    /// Session code uses this: an event with no listener is simply dropped
    pub fn emit_lossy(&self, event: ValidationEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Validation event dropped, no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
