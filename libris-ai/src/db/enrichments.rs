//! Enrichment slot database operations
//!
//! Every status write is a conditional UPDATE keyed on the expected current
//! status, so overlapping poller passes, the reaper and user triggers can
//! race without corrupting a slot: whoever loses sees zero affected rows.

use chrono::{DateTime, Utc};
use libris_common::time::{parse_db_timestamp, to_db_timestamp};
use libris_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{parse_json, parse_uuid};
use crate::models::{EnrichmentKind, EnrichmentSlot, EnrichmentStatus};

/// Outcome of a user or creation-time enrichment request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Slot moved to `pending` from the given status
    Queued { from: EnrichmentStatus },
    /// Slot already pending or processing; nothing changed
    AlreadyQueued(EnrichmentStatus),
    /// Slot completed and the request did not (or could not) force a rerun
    AlreadyCompleted,
}

const SLOT_COLUMNS: &str =
    "item_id, kind, status, result, note, cache_key, force_refresh, created_at, updated_at";

/// Load one slot; `None` when the slot was never requested
pub async fn load_slot(pool: &SqlitePool, item_id: Uuid, kind: EnrichmentKind) -> Result<Option<EnrichmentSlot>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM enrichments WHERE item_id = ? AND kind = ?",
        SLOT_COLUMNS
    ))
    .bind(item_id.to_string())
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|r| slot_from_row(&r)).transpose()
}

/// All requested slots of an item
pub async fn list_slots(pool: &SqlitePool, item_id: Uuid) -> Result<Vec<EnrichmentSlot>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM enrichments WHERE item_id = ? ORDER BY kind",
        SLOT_COLUMNS
    ))
    .bind(item_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(slot_from_row).collect()
}

/// Move a slot to `pending`
///
/// - absent or `failed` → `pending`
/// - `pending`/`processing` → unchanged
/// - `completed` → unchanged unless `force`; a forced rerun of a cached kind
///   that already holds a non-empty result is only honoured when
///   `reanalyze_existing` is set
pub async fn request_slot(
    pool: &SqlitePool,
    item_id: Uuid,
    kind: EnrichmentKind,
    force: bool,
    reanalyze_existing: bool,
    now: DateTime<Utc>,
) -> Result<RequestOutcome> {
    let ts = to_db_timestamp(now);

    let inserted = sqlx::query(
        r#"
        INSERT INTO enrichments (item_id, kind, status, force_refresh, created_at, updated_at)
        VALUES (?, ?, 'pending', 0, ?, ?)
        ON CONFLICT(item_id, kind) DO NOTHING
        "#,
    )
    .bind(item_id.to_string())
    .bind(kind.as_str())
    .bind(&ts)
    .bind(&ts)
    .execute(pool)
    .await?;

    if inserted.rows_affected() > 0 {
        return Ok(RequestOutcome::Queued {
            from: EnrichmentStatus::None,
        });
    }

    let Some(slot) = load_slot(pool, item_id, kind).await? else {
        // Deleted between the insert and the read
        return Err(Error::NotFound(format!("enrichment slot {}/{}", item_id, kind)));
    };

    if slot.status.transition_to(EnrichmentStatus::Pending).is_err() {
        return Ok(RequestOutcome::AlreadyQueued(slot.status));
    }

    match slot.status {
        EnrichmentStatus::Failed => {
            let moved = sqlx::query(
                r#"
                UPDATE enrichments
                SET status = 'pending', note = NULL, updated_at = ?
                WHERE item_id = ? AND kind = ? AND status = 'failed'
                "#,
            )
            .bind(&ts)
            .bind(item_id.to_string())
            .bind(kind.as_str())
            .execute(pool)
            .await?;

            if moved.rows_affected() > 0 {
                Ok(RequestOutcome::Queued {
                    from: EnrichmentStatus::Failed,
                })
            } else {
                Ok(RequestOutcome::AlreadyQueued(EnrichmentStatus::Pending))
            }
        }
        EnrichmentStatus::Completed => {
            let has_result = slot.result.as_ref().is_some_and(|r| !is_empty_json(r));
            if !force || (kind.is_cached() && has_result && !reanalyze_existing) {
                return Ok(RequestOutcome::AlreadyCompleted);
            }

            let moved = sqlx::query(
                r#"
                UPDATE enrichments
                SET status = 'pending', result = NULL, note = NULL, force_refresh = 1, updated_at = ?
                WHERE item_id = ? AND kind = ? AND status = 'completed'
                "#,
            )
            .bind(&ts)
            .bind(item_id.to_string())
            .bind(kind.as_str())
            .execute(pool)
            .await?;

            if moved.rows_affected() > 0 {
                Ok(RequestOutcome::Queued {
                    from: EnrichmentStatus::Completed,
                })
            } else {
                Ok(RequestOutcome::AlreadyQueued(EnrichmentStatus::Pending))
            }
        }
        other => Err(Error::Internal(format!("stored slot with status {}", other))),
    }
}

/// Up to `limit` pending slots of a kind, most recently updated first
pub async fn list_pending(pool: &SqlitePool, kind: EnrichmentKind, limit: u32) -> Result<Vec<Uuid>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT item_id FROM enrichments
        WHERE kind = ? AND status = 'pending'
        ORDER BY updated_at DESC
        LIMIT ?
        "#,
    )
    .bind(kind.as_str())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|(id,)| parse_uuid(id)).collect()
}

/// Claim a pending slot (`pending → processing`)
///
/// Returns false when another pass claimed it first or it left `pending`.
pub async fn claim(pool: &SqlitePool, item_id: Uuid, kind: EnrichmentKind, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE enrichments
        SET status = 'processing', note = NULL, updated_at = ?
        WHERE item_id = ? AND kind = ? AND status = 'pending'
        "#,
    )
    .bind(to_db_timestamp(now))
    .bind(item_id.to_string())
    .bind(kind.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Up to `limit` processing slots of a kind last touched before `cutoff`, oldest first
pub async fn list_stale(
    pool: &SqlitePool,
    kind: EnrichmentKind,
    cutoff: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<Uuid>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT item_id FROM enrichments
        WHERE kind = ? AND status = 'processing' AND updated_at < ?
        ORDER BY updated_at ASC
        LIMIT ?
        "#,
    )
    .bind(kind.as_str())
    .bind(to_db_timestamp(cutoff))
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|(id,)| parse_uuid(id)).collect()
}

/// `processing → failed` for a claim that is still older than `cutoff`
pub async fn fail_if_stale(
    pool: &SqlitePool,
    item_id: Uuid,
    kind: EnrichmentKind,
    cutoff: DateTime<Utc>,
    note: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE enrichments
        SET status = 'failed', result = NULL, note = ?, force_refresh = 0, updated_at = ?
        WHERE item_id = ? AND kind = ? AND status = 'processing' AND updated_at < ?
        "#,
    )
    .bind(note)
    .bind(to_db_timestamp(now))
    .bind(item_id.to_string())
    .bind(kind.as_str())
    .bind(to_db_timestamp(cutoff))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// `processing → completed` with the result, inside the writer's transaction
pub async fn mark_completed(
    conn: &mut SqliteConnection,
    item_id: Uuid,
    kind: EnrichmentKind,
    payload: &serde_json::Value,
    cache_key: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE enrichments
        SET status = 'completed', result = ?, note = NULL, cache_key = ?,
            force_refresh = 0, updated_at = ?
        WHERE item_id = ? AND kind = ? AND status = 'processing'
        "#,
    )
    .bind(payload.to_string())
    .bind(cache_key)
    .bind(to_db_timestamp(now))
    .bind(item_id.to_string())
    .bind(kind.as_str())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// `processing → failed` with a diagnostic note
pub async fn mark_failed(
    conn: &mut SqliteConnection,
    item_id: Uuid,
    kind: EnrichmentKind,
    note: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE enrichments
        SET status = 'failed', result = NULL, note = ?, force_refresh = 0, updated_at = ?
        WHERE item_id = ? AND kind = ? AND status = 'processing'
        "#,
    )
    .bind(note)
    .bind(to_db_timestamp(now))
    .bind(item_id.to_string())
    .bind(kind.as_str())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn is_empty_json(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Array(a) => a.is_empty() || a.iter().all(is_empty_json),
        serde_json::Value::Object(o) => o.is_empty() || o.values().all(is_empty_json),
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn slot_from_row(row: &SqliteRow) -> Result<EnrichmentSlot> {
    let item_id: String = row.get("item_id");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let result: Option<String> = row.get("result");
    let force_refresh: i64 = row.get("force_refresh");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(EnrichmentSlot {
        item_id: parse_uuid(&item_id)?,
        kind: kind.parse().map_err(Error::Internal)?,
        status: status.parse().map_err(Error::Internal)?,
        result: result.as_deref().map(parse_json).transpose()?,
        note: row.get("note"),
        cache_key: row.get("cache_key"),
        force_refresh: force_refresh != 0,
        created_at: Some(parse_db_timestamp(&created_at)?),
        updated_at: Some(parse_db_timestamp(&updated_at)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{items, test_pool};
    use crate::models::{Item, MediaType, NewItem};
    use chrono::Duration;
    use serde_json::json;

    async fn seed_item(pool: &SqlitePool) -> Uuid {
        let item = Item::new(
            &NewItem {
                owner_id: "user-1".into(),
                media_type: MediaType::Book,
                title: "Moby Dick".into(),
                creator: "Herman Melville".into(),
                external_id: None,
                description: String::new(),
                auto_enrich: false,
            },
            Utc::now(),
        );
        items::insert_item(pool, &item).await.unwrap();
        item.id
    }

    async fn complete(pool: &SqlitePool, id: Uuid, kind: EnrichmentKind, value: serde_json::Value) {
        assert!(claim(pool, id, kind, Utc::now()).await.unwrap());
        let mut conn = pool.acquire().await.unwrap();
        assert!(mark_completed(&mut conn, id, kind, &value, None, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_request_from_absent_queues() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;

        let outcome = request_slot(&pool, id, EnrichmentKind::Details, false, false, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Queued { from: EnrichmentStatus::None });

        let slot = load_slot(&pool, id, EnrichmentKind::Details).await.unwrap().unwrap();
        assert_eq!(slot.status, EnrichmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_request_is_idempotent_while_in_flight() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;
        let kind = EnrichmentKind::Quote;

        request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();
        let again = request_slot(&pool, id, kind, true, false, Utc::now()).await.unwrap();
        assert_eq!(again, RequestOutcome::AlreadyQueued(EnrichmentStatus::Pending));

        assert!(claim(&pool, id, kind, Utc::now()).await.unwrap());
        let during = request_slot(&pool, id, kind, true, false, Utc::now()).await.unwrap();
        assert_eq!(during, RequestOutcome::AlreadyQueued(EnrichmentStatus::Processing));

        let slot = load_slot(&pool, id, kind).await.unwrap().unwrap();
        assert_eq!(slot.status, EnrichmentStatus::Processing);
    }

    #[tokio::test]
    async fn test_claim_only_once() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;
        let kind = EnrichmentKind::Details;

        request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();
        assert!(claim(&pool, id, kind, Utc::now()).await.unwrap());
        assert!(!claim(&pool, id, kind, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_completed_requires_force() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;
        let kind = EnrichmentKind::Quote;

        request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();
        complete(&pool, id, kind, json!({"text": "Call me Ishmael."})).await;

        let unforced = request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();
        assert_eq!(unforced, RequestOutcome::AlreadyCompleted);

        let forced = request_slot(&pool, id, kind, true, false, Utc::now()).await.unwrap();
        assert_eq!(forced, RequestOutcome::Queued { from: EnrichmentStatus::Completed });

        let slot = load_slot(&pool, id, kind).await.unwrap().unwrap();
        assert!(slot.result.is_none());
        assert!(slot.force_refresh);
    }

    #[tokio::test]
    async fn test_forced_cached_kind_respects_reanalysis_policy() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;
        let kind = EnrichmentKind::Characters;

        request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();
        complete(&pool, id, kind, json!({"characters": [{"name": "Ahab"}]})).await;

        let skipped = request_slot(&pool, id, kind, true, false, Utc::now()).await.unwrap();
        assert_eq!(skipped, RequestOutcome::AlreadyCompleted);

        let queued = request_slot(&pool, id, kind, true, true, Utc::now()).await.unwrap();
        assert_eq!(queued, RequestOutcome::Queued { from: EnrichmentStatus::Completed });
    }

    #[tokio::test]
    async fn test_failed_requeues_and_clears_note() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;
        let kind = EnrichmentKind::Details;

        request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();
        claim(&pool, id, kind, Utc::now()).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        assert!(mark_failed(&mut conn, id, kind, "HTTP 500", Utc::now()).await.unwrap());
        drop(conn);

        let outcome = request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();
        assert_eq!(outcome, RequestOutcome::Queued { from: EnrichmentStatus::Failed });
        let slot = load_slot(&pool, id, kind).await.unwrap().unwrap();
        assert_eq!(slot.status, EnrichmentStatus::Pending);
        assert!(slot.note.is_none());
    }

    #[tokio::test]
    async fn test_writes_require_processing() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;
        let kind = EnrichmentKind::Details;
        request_slot(&pool, id, kind, false, false, Utc::now()).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let value = json!({"description": "x", "tags": []});
        assert!(!mark_completed(&mut conn, id, kind, &value, None, Utc::now()).await.unwrap());
        assert!(!mark_failed(&mut conn, id, kind, "nope", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_stale_and_fail_if_stale() {
        let pool = test_pool().await;
        let id = seed_item(&pool).await;
        let kind = EnrichmentKind::Details;
        let claimed_at = Utc::now() - Duration::minutes(20);

        request_slot(&pool, id, kind, false, false, claimed_at).await.unwrap();
        claim(&pool, id, kind, claimed_at).await.unwrap();

        let cutoff = Utc::now() - Duration::minutes(5);
        assert_eq!(list_stale(&pool, kind, cutoff, 5).await.unwrap(), vec![id]);
        assert!(fail_if_stale(&pool, id, kind, cutoff, "timeout", Utc::now()).await.unwrap());
        assert!(list_stale(&pool, kind, cutoff, 5).await.unwrap().is_empty());

        let slot = load_slot(&pool, id, kind).await.unwrap().unwrap();
        assert_eq!(slot.status, EnrichmentStatus::Failed);
        assert_eq!(slot.note.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_list_pending_most_recent_first() {
        let pool = test_pool().await;
        let older = seed_item(&pool).await;
        let newer = seed_item(&pool).await;
        let kind = EnrichmentKind::Details;
        let now = Utc::now();

        request_slot(&pool, older, kind, false, false, now - Duration::seconds(30)).await.unwrap();
        request_slot(&pool, newer, kind, false, false, now).await.unwrap();

        assert_eq!(list_pending(&pool, kind, 5).await.unwrap(), vec![newer, older]);
        assert_eq!(list_pending(&pool, kind, 1).await.unwrap(), vec![newer]);
    }

    #[test]
    fn test_is_empty_json() {
        assert!(is_empty_json(&json!({"characters": []})));
        assert!(is_empty_json(&json!({"text": "  "})));
        assert!(!is_empty_json(&json!({"characters": [{"name": "Ahab"}]})));
    }
}
