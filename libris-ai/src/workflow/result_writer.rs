//! Result writer
//!
//! Applies the outcome of one enrichment attempt. The slot is re-read right
//! before writing and only a slot still in `processing` is touched, so a
//! write that lost a race (reaper fired, item deleted) is abandoned quietly
//! instead of clobbering newer state.

use libris_common::events::{EventBus, LibrisEvent};
use libris_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cache_resolver::CacheEntry;
use super::clock::Clock;
use crate::db::{enrichments, items, work_cache};
use crate::models::{EnrichmentKind, EnrichmentPayload, EnrichmentStatus, Item};
use crate::utils::retry_on_lock;

/// Item descriptions shorter than this are replaced by generated details
pub const DESCRIPTION_REPLACE_BELOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Item or slot no longer exists
    NotFound,
    /// Slot left `processing` before the write (current status attached)
    Superseded(EnrichmentStatus),
}

/// What to do with the global cache alongside a completion
#[derive(Debug, Clone, Copy)]
pub enum CacheWrite<'a> {
    Skip,
    /// Result came from this cache row
    Link(&'a str),
    /// Result is new; publish it under this entry
    Publish(&'a CacheEntry),
}

pub struct ResultWriter {
    db: SqlitePool,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    max_lock_wait_ms: u64,
}

impl ResultWriter {
    pub fn new(db: SqlitePool, event_bus: EventBus, clock: Arc<dyn Clock>, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            event_bus,
            clock,
            max_lock_wait_ms,
        }
    }

    /// `processing → completed` with the payload and its side effects
    pub async fn complete(
        &self,
        item_id: Uuid,
        kind: EnrichmentKind,
        payload: &EnrichmentPayload,
        cache: CacheWrite<'_>,
    ) -> Result<WriteOutcome> {
        let outcome = retry_on_lock("complete enrichment", self.max_lock_wait_ms, || {
            self.complete_once(item_id, kind, payload, cache)
        })
        .await?;

        if let Outcome::Written(item) = &outcome {
            info!(item_id = %item_id, %kind, "Enrichment completed");
            self.notify(item, kind, EnrichmentStatus::Completed, None);
        }
        Ok(outcome.into())
    }

    async fn complete_once(
        &self,
        item_id: Uuid,
        kind: EnrichmentKind,
        payload: &EnrichmentPayload,
        cache: CacheWrite<'_>,
    ) -> Result<Outcome> {
        let Some(item) = items::load_item(&self.db, item_id).await? else {
            return Ok(Outcome::NotFound);
        };
        if let Some(outcome) = self.check_transition(item_id, kind, EnrichmentStatus::Completed).await? {
            return Ok(outcome);
        }

        let now = self.clock.now();
        let value = payload.to_value();
        let cache_key = match cache {
            CacheWrite::Skip => None,
            CacheWrite::Link(key) => Some(key),
            CacheWrite::Publish(entry) => Some(entry.key.as_str()),
        };

        let mut tx = self.db.begin().await?;

        if !enrichments::mark_completed(&mut *tx, item_id, kind, &value, cache_key, now).await? {
            tx.rollback().await?;
            return Ok(Outcome::Superseded(self.current_status(item_id, kind).await?));
        }

        if let EnrichmentPayload::Details(details) = payload {
            let generated = details.description.trim();
            let replace = !generated.is_empty()
                && item.description.trim().chars().count() < DESCRIPTION_REPLACE_BELOW;
            let description = replace.then_some(generated);
            items::apply_details(&mut *tx, item_id, description, &details.tags, now).await?;
        }

        if let CacheWrite::Publish(entry) = cache {
            work_cache::upsert_completed(&mut *tx, kind, entry.identity(), &value, now).await?;
        }

        tx.commit().await?;
        Ok(Outcome::Written(item))
    }

    /// `processing → failed` with a diagnostic note
    ///
    /// Falls back to one direct conditional update when the primary path
    /// errors, so a visible `processing` indicator is not left behind.
    pub async fn fail(&self, item_id: Uuid, kind: EnrichmentKind, note: &str) -> Result<WriteOutcome> {
        let primary = retry_on_lock("fail enrichment", self.max_lock_wait_ms, || {
            self.fail_once(item_id, kind, note)
        })
        .await;

        let outcome = match primary {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(item_id = %item_id, %kind, error = %e, "Primary failure write errored, retrying directly");
                self.fail_direct(item_id, kind, note).await?
            }
        };

        if let Outcome::Written(item) = &outcome {
            info!(item_id = %item_id, %kind, note, "Enrichment failed");
            self.notify(item, kind, EnrichmentStatus::Failed, Some(note.to_string()));
        }
        Ok(outcome.into())
    }

    /// Single conditional update with no pre-checks
    async fn fail_direct(&self, item_id: Uuid, kind: EnrichmentKind, note: &str) -> Result<Outcome> {
        let written = {
            let mut conn = self.db.acquire().await?;
            enrichments::mark_failed(&mut conn, item_id, kind, note, self.clock.now()).await
        };
        match written {
            Ok(true) => Ok(match items::load_item(&self.db, item_id).await? {
                Some(item) => Outcome::Written(item),
                None => Outcome::NotFound,
            }),
            Ok(false) => Ok(match enrichments::load_slot(&self.db, item_id, kind).await? {
                Some(slot) => Outcome::Superseded(slot.status),
                None => Outcome::NotFound,
            }),
            Err(fallback) => {
                error!(item_id = %item_id, %kind, error = %fallback, "Could not mark enrichment failed");
                Err(fallback)
            }
        }
    }

    async fn fail_once(&self, item_id: Uuid, kind: EnrichmentKind, note: &str) -> Result<Outcome> {
        let Some(item) = items::load_item(&self.db, item_id).await? else {
            return Ok(Outcome::NotFound);
        };
        if let Some(outcome) = self.check_transition(item_id, kind, EnrichmentStatus::Failed).await? {
            return Ok(outcome);
        }

        let mut conn = self.db.acquire().await?;
        if enrichments::mark_failed(&mut conn, item_id, kind, note, self.clock.now()).await? {
            Ok(Outcome::Written(item))
        } else {
            drop(conn);
            Ok(Outcome::Superseded(self.current_status(item_id, kind).await?))
        }
    }

    /// Broadcast a status change for an item
    pub fn notify(&self, item: &Item, kind: EnrichmentKind, status: EnrichmentStatus, note: Option<String>) {
        self.event_bus.emit_lossy(LibrisEvent::EnrichmentStatusChanged {
            item_id: item.id,
            owner_id: item.owner_id.clone(),
            kind: kind.as_str().to_string(),
            status: status.as_str().to_string(),
            note,
            timestamp: self.clock.now(),
        });
    }

    /// Broadcast a status change when only the item id is at hand
    pub async fn notify_by_id(
        &self,
        item_id: Uuid,
        kind: EnrichmentKind,
        status: EnrichmentStatus,
        note: Option<String>,
    ) -> Result<()> {
        match items::load_item(&self.db, item_id).await? {
            Some(item) => self.notify(&item, kind, status, note),
            None => debug!(item_id = %item_id, "Item gone; status event dropped"),
        }
        Ok(())
    }

    async fn current_status(&self, item_id: Uuid, kind: EnrichmentKind) -> Result<EnrichmentStatus> {
        Ok(enrichments::load_slot(&self.db, item_id, kind)
            .await?
            .map(|s| s.status)
            .unwrap_or(EnrichmentStatus::None))
    }

    /// Re-read the slot; `Some` when the write to `next` must be abandoned
    async fn check_transition(
        &self,
        item_id: Uuid,
        kind: EnrichmentKind,
        next: EnrichmentStatus,
    ) -> Result<Option<Outcome>> {
        let Some(slot) = enrichments::load_slot(&self.db, item_id, kind).await? else {
            return Ok(Some(Outcome::NotFound));
        };
        match slot.status.transition_to(next) {
            Ok(_) => Ok(None),
            Err(rejected) => {
                debug!(item_id = %item_id, %kind, %rejected, "Slot moved on; write abandoned");
                Ok(Some(Outcome::Superseded(slot.status)))
            }
        }
    }
}

/// Internal outcome carrying the fresh item for event emission
enum Outcome {
    Written(Item),
    NotFound,
    Superseded(EnrichmentStatus),
}

impl From<Outcome> for WriteOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Written(_) => WriteOutcome::Written,
            Outcome::NotFound => WriteOutcome::NotFound,
            Outcome::Superseded(status) => WriteOutcome::Superseded(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::{MediaType, NewItem};
    use crate::workflow::clock::SystemClock;
    use std::time::Duration;

    async fn seed(pool: &SqlitePool) -> Item {
        let item = Item::new(
            &NewItem {
                owner_id: "alice".to_string(),
                media_type: MediaType::Book,
                title: "Moby Dick".to_string(),
                creator: String::new(),
                external_id: None,
                description: String::new(),
                auto_enrich: false,
            },
            chrono::Utc::now(),
        );
        items::insert_item(pool, &item).await.unwrap();
        item
    }

    #[tokio::test]
    async fn test_direct_failure_runs_on_one_connection() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone(), EventBus::new(16), Arc::new(SystemClock), 1000);
        let item = seed(&pool).await;
        let now = chrono::Utc::now();

        enrichments::request_slot(&pool, item.id, EnrichmentKind::Quote, false, false, now)
            .await
            .unwrap();
        let pending = tokio::time::timeout(
            Duration::from_secs(5),
            writer.fail_direct(item.id, EnrichmentKind::Quote, "boom"),
        )
        .await
        .expect("fallback must not wait on a second connection")
        .unwrap();
        assert_eq!(WriteOutcome::from(pending), WriteOutcome::Superseded(EnrichmentStatus::Pending));

        assert!(enrichments::claim(&pool, item.id, EnrichmentKind::Quote, now).await.unwrap());
        let claimed = tokio::time::timeout(
            Duration::from_secs(5),
            writer.fail_direct(item.id, EnrichmentKind::Quote, "boom"),
        )
        .await
        .expect("fallback must not wait on a second connection")
        .unwrap();
        assert_eq!(WriteOutcome::from(claimed), WriteOutcome::Written);

        let slot = enrichments::load_slot(&pool, item.id, EnrichmentKind::Quote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(slot.status, EnrichmentStatus::Failed);
        assert_eq!(slot.note.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_direct_failure_without_slot_reports_missing() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone(), EventBus::new(16), Arc::new(SystemClock), 1000);

        let outcome = writer
            .fail_direct(Uuid::new_v4(), EnrichmentKind::Quote, "boom")
            .await
            .unwrap();
        assert_eq!(WriteOutcome::from(outcome), WriteOutcome::NotFound);
    }
}
