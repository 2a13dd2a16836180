//! Event types for the TuneDeck event system
//!
//! Events are broadcast via [`EventBus`] so that loosely coupled
//! components (status polling, logging, future UIs) can observe the
//! download lifecycle without holding references into the pipeline.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// TuneDeck event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeckEvent {
    /// A download task moved to a new lifecycle state
    TaskStateChanged {
        task_id: Uuid,
        old_state: String,
        new_state: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic transfer progress for an active download
    ///
    /// Emitted lossy; slow subscribers may miss intermediate updates.
    TaskProgress {
        task_id: Uuid,
        percent: u8,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was registered in the catalog
    TrackCatalogued {
        video_id: String,
        file_path: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reference was marked rejected (or un-rejected)
    RejectionChanged {
        video_id: String,
        rejected: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for [`DeckEvent`]s.
///
/// Uses `tokio::broadcast` internally: multiple producers, multiple
/// consumers, and bounded buffering with lagging receivers dropped
/// behind rather than blocking emitters.
pub struct EventBus {
    tx: broadcast::Sender<DeckEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeckEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening.
    pub fn emit_lossy(&self, event: DeckEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit_lossy(DeckEvent::RejectionChanged {
            video_id: "abc123def45".to_string(),
            rejected: true,
            timestamp: chrono::Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        match event {
            DeckEvent::RejectionChanged { video_id, rejected, .. } => {
                assert_eq!(video_id, "abc123def45");
                assert!(rejected);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(DeckEvent::TrackCatalogued {
            video_id: "abc123def45".to_string(),
            file_path: "/music/test.mp3".to_string(),
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
