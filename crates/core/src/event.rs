//! Domain event system: observability signals between bounded contexts.
//!
//! The notary and fleet manager publish events when something interesting
//! happens (atoms appended, a sync failing). Absorbed failures surface here
//! instead of being raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A location atom was composed for the first time
    LocationRegistered {
        location_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A noise event atom was composed and handed to the store
    FactAppended {
        event_id: String,
        location_id: String,
        persisted: bool,
        timestamp: DateTime<Utc>,
    },

    /// A fact arrived from a device missing from the registry
    UnknownDevice {
        mac_address: String,
        timestamp: DateTime<Utc>,
    },

    /// The notary could not write the ledger (in-memory state kept)
    LedgerWriteFailed {
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A reader swapped in a fresh snapshot
    LedgerSynced {
        locations: usize,
        events: usize,
        skipped_lines: usize,
        timestamp: DateTime<Utc>,
    },

    /// A reader poll failed; the previous snapshot stays in service
    LedgerSyncFailed {
        error_message: String,
        consecutive_failures: u32,
        timestamp: DateTime<Utc>,
    },

    /// A query was answered (successfully or with a fallback string)
    QueryAnswered {
        generated: bool,
        answer_len: usize,
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
