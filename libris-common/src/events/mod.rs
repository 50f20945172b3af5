//! Event types for the Libris event system
//!
//! Stand-in for the record store's realtime subscriptions: every status
//! change written by the enrichment pipeline and every ledger mutation is
//! broadcast here, and the HTTP layer relays it to subscribed clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Libris event types
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LibrisEvent {
    /// Item added to a user's library
    ItemCreated {
        item_id: Uuid,
        owner_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An enrichment slot changed status
    ///
    /// Triggers:
    /// - SSE: in-progress indicator, retry affordance, or result render
    EnrichmentStatusChanged {
        item_id: Uuid,
        owner_id: String,
        /// Enrichment kind (e.g. "details", "characters")
        kind: String,
        /// New status ("pending", "processing", "completed", "failed")
        status: String,
        /// Short diagnostic for failures
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A user's credit balance changed
    CreditsChanged {
        user_id: String,
        balance: i64,
        /// Signed change applied (negative for deductions)
        delta: i64,
        timestamp: DateTime<Utc>,
    },
}

impl LibrisEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            LibrisEvent::ItemCreated { .. } => "ItemCreated",
            LibrisEvent::EnrichmentStatusChanged { .. } => "EnrichmentStatusChanged",
            LibrisEvent::CreditsChanged { .. } => "CreditsChanged",
        }
    }

    /// User the event belongs to
    pub fn user_id(&self) -> &str {
        match self {
            LibrisEvent::ItemCreated { owner_id, .. } => owner_id,
            LibrisEvent::EnrichmentStatusChanged { owner_id, .. } => owner_id,
            LibrisEvent::CreditsChanged { user_id, .. } => user_id,
        }
    }

    /// Item the event belongs to, if any
    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            LibrisEvent::ItemCreated { item_id, .. } => Some(*item_id),
            LibrisEvent::EnrichmentStatusChanged { item_id, .. } => Some(*item_id),
            LibrisEvent::CreditsChanged { .. } => None,
        }
    }
}

/// Broadcast bus for [`LibrisEvent`]s
///
/// Cloning shares the same underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LibrisEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LibrisEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    pub fn emit(
        &self,
        event: LibrisEvent,
    ) -> Result<usize, broadcast::error::SendError<LibrisEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LibrisEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event(item_id: Uuid) -> LibrisEvent {
        LibrisEvent::EnrichmentStatusChanged {
            item_id,
            owner_id: "user-1".to_string(),
            kind: "details".to_string(),
            status: "completed".to_string(),
            note: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let item_id = Uuid::new_v4();

        bus.emit(status_event(item_id)).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.item_id(), Some(item_id));
        assert_eq!(received.event_type(), "EnrichmentStatusChanged");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(status_event(Uuid::new_v4())).is_err());
        // Lossy variant must not panic
        bus.emit_lossy(status_event(Uuid::new_v4()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_serialized_tag_and_note_omitted() {
        let json = serde_json::to_value(status_event(Uuid::new_v4())).unwrap();
        assert_eq!(json["type"], "EnrichmentStatusChanged");
        assert!(json.get("note").is_none());
    }

    #[test]
    fn test_credits_event_user() {
        let event = LibrisEvent::CreditsChanged {
            user_id: "u-9".to_string(),
            balance: 4,
            delta: -1,
            timestamp: Utc::now(),
        };
        assert_eq!(event.user_id(), "u-9");
        assert_eq!(event.item_id(), None);
    }
}
