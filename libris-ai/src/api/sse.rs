//! Server-Sent Events (SSE) relay of pipeline and ledger events

use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use libris_common::events::LibrisEvent;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Only relay events belonging to this user
    pub user_id: Option<String>,
}

impl EventFilter {
    fn accepts(&self, event: &LibrisEvent) -> bool {
        self.user_id
            .as_deref()
            .map_or(true, |user| event.user_id() == user)
    }
}

/// GET /events - SSE stream of status and credit changes
///
/// Streams:
/// - ItemCreated
/// - EnrichmentStatusChanged
/// - CreditsChanged
///
/// A subscriber that falls behind loses the oldest events and keeps
/// receiving; clients re-read the item to resynchronise.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = ?filter.user_id, "New SSE client connected");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if !filter.accepts(&event) {
                                continue;
                            }
                            let event_type = event.event_type().to_string();

                            match serde_json::to_string(&event) {
                                Ok(event_json) => {
                                    debug!("SSE: Broadcasting event: {}", event_type);
                                    yield Ok(Event::default()
                                        .event(event_type)
                                        .data(event_json));
                                }
                                Err(e) => {
                                    warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: Subscriber lagged, {} events dropped", skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("SSE: Event bus closed");
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn credits_event(user: &str) -> LibrisEvent {
        LibrisEvent::CreditsChanged {
            user_id: user.to_string(),
            balance: 4,
            delta: -1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_filter_without_user_accepts_everything() {
        let filter = EventFilter::default();
        assert!(filter.accepts(&credits_event("alice")));
        assert!(filter.accepts(&credits_event("bob")));
    }

    #[test]
    fn test_filter_by_user() {
        let filter = EventFilter {
            user_id: Some("alice".to_string()),
        };
        assert!(filter.accepts(&credits_event("alice")));
        assert!(!filter.accepts(&credits_event("bob")));
    }
}
