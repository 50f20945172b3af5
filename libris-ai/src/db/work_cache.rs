//! Global work cache operations
//!
//! One row per (kind, natural key), shared by every owner of the same work.
//! Rows are created on first computation and updated in place afterwards;
//! nothing in the service deletes them.

use chrono::{DateTime, Utc};
use libris_common::time::{parse_db_timestamp, to_db_timestamp};
use libris_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::parse_json;
use crate::models::{EnrichmentKind, EnrichmentStatus};

/// Cached result for one work
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRow {
    pub kind: EnrichmentKind,
    pub natural_key: String,
    pub title: String,
    pub creator: Option<String>,
    pub external_id: Option<String>,
    pub status: EnrichmentStatus,
    pub result: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Identity columns written alongside a cache row
#[derive(Debug, Clone, Copy)]
pub struct CacheIdentity<'a> {
    pub natural_key: &'a str,
    pub title: &'a str,
    pub creator: Option<&'a str>,
    pub external_id: Option<&'a str>,
}

/// Exact-match lookup by natural key
pub async fn lookup(pool: &SqlitePool, kind: EnrichmentKind, natural_key: &str) -> Result<Option<CacheRow>> {
    let row = sqlx::query(
        r#"
        SELECT kind, natural_key, title, creator, external_id, status, result, updated_at
        FROM work_cache
        WHERE kind = ? AND natural_key = ?
        "#,
    )
    .bind(kind.as_str())
    .bind(natural_key)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let result: Option<String> = row.get("result");
    let updated_at: String = row.get("updated_at");

    Ok(Some(CacheRow {
        kind: kind.parse().map_err(Error::Internal)?,
        natural_key: row.get("natural_key"),
        title: row.get("title"),
        creator: row.get("creator"),
        external_id: row.get("external_id"),
        status: status.parse().map_err(Error::Internal)?,
        result: result.as_deref().map(parse_json).transpose()?,
        updated_at: parse_db_timestamp(&updated_at)?,
    }))
}

/// Record that a computation for this key is in flight
///
/// Creates the row without a result if absent; an existing row is left alone
/// so a usable result is never discarded.
pub async fn mark_in_flight(
    pool: &SqlitePool,
    kind: EnrichmentKind,
    identity: CacheIdentity<'_>,
    now: DateTime<Utc>,
) -> Result<()> {
    let ts = to_db_timestamp(now);
    sqlx::query(
        r#"
        INSERT INTO work_cache (kind, natural_key, title, creator, external_id, status, result, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'processing', NULL, ?, ?)
        ON CONFLICT(kind, natural_key) DO NOTHING
        "#,
    )
    .bind(kind.as_str())
    .bind(identity.natural_key)
    .bind(identity.title)
    .bind(identity.creator)
    .bind(identity.external_id)
    .bind(&ts)
    .bind(&ts)
    .execute(pool)
    .await?;

    Ok(())
}

/// Publish a computed result (update if the key exists, else create)
///
/// Concurrent publishers for the same key resolve last-writer-wins.
pub async fn upsert_completed(
    conn: &mut SqliteConnection,
    kind: EnrichmentKind,
    identity: CacheIdentity<'_>,
    result: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()> {
    let ts = to_db_timestamp(now);
    sqlx::query(
        r#"
        INSERT INTO work_cache (kind, natural_key, title, creator, external_id, status, result, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'completed', ?, ?, ?)
        ON CONFLICT(kind, natural_key) DO UPDATE SET
            title = excluded.title,
            creator = excluded.creator,
            external_id = COALESCE(excluded.external_id, work_cache.external_id),
            status = 'completed',
            result = excluded.result,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(kind.as_str())
    .bind(identity.natural_key)
    .bind(identity.title)
    .bind(identity.creator)
    .bind(identity.external_id)
    .bind(result.to_string())
    .bind(&ts)
    .bind(&ts)
    .execute(conn)
    .await?;

    Ok(())
}

/// Mark an in-flight row failed, unless another computation already filled it
pub async fn mark_failed_if_empty(
    pool: &SqlitePool,
    kind: EnrichmentKind,
    natural_key: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE work_cache
        SET status = 'failed', updated_at = ?
        WHERE kind = ? AND natural_key = ? AND result IS NULL
        "#,
    )
    .bind(to_db_timestamp(now))
    .bind(kind.as_str())
    .bind(natural_key)
    .execute(pool)
    .await?;

    Ok(())
}
