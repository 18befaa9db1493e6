//! Domain event system — decouples the session state machine from whatever
//! renders it.
//!
//! Sessions publish an event whenever their observable state changes.
//! A rendering layer subscribes and redraws; it never drives the pipeline
//! through this channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::document::DocumentSlot;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A document was extracted and stored in a slot
    DocumentLoaded {
        session_id: String,
        slot: DocumentSlot,
        source: String,
        chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// A load failed; the slot kept its previous content
    DocumentLoadFailed {
        session_id: String,
        slot: DocumentSlot,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The "include protocol" toggle changed
    SupplementaryToggled {
        session_id: String,
        enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// A query cycle reached its terminal state
    QuerySettled {
        session_id: String,
        success: bool,
        documents_used: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
