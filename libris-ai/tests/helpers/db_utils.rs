//! Database Test Utilities

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use libris_ai::db::items;
use libris_ai::models::{Item, MediaType, NewItem};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create temporary test database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_libris.db");
    let pool = libris_common::db::init_database(&db_path).await?;
    Ok((temp_dir, pool))
}

/// Fixed start time for clock-driven tests
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

/// Insert an item owned by `owner`
pub async fn seed_item(
    pool: &SqlitePool,
    owner: &str,
    media_type: MediaType,
    title: &str,
    creator: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Item {
    let item = Item::new(
        &NewItem {
            owner_id: owner.to_string(),
            media_type,
            title: title.to_string(),
            creator: creator.to_string(),
            external_id: None,
            description: description.to_string(),
            auto_enrich: false,
        },
        now,
    );
    items::insert_item(pool, &item).await.unwrap();
    item
}

/// Raw status column of a slot, "none" when absent
pub async fn slot_status(pool: &SqlitePool, item_id: uuid::Uuid, kind: &str) -> String {
    sqlx::query_scalar("SELECT status FROM enrichments WHERE item_id = ? AND kind = ?")
        .bind(item_id.to_string())
        .bind(kind)
        .fetch_optional(pool)
        .await
        .unwrap()
        .unwrap_or_else(|| "none".to_string())
}
