//! Record store access for libris-ai
//!
//! Thin query modules over the shared SQLite schema created by
//! `libris_common::db::init_schema`. Functions take `&SqlitePool` unless they
//! must run inside a caller's transaction, in which case they take
//! `&mut SqliteConnection`.

pub mod enrichments;
pub mod items;
pub mod settings;
pub mod users;
pub mod work_cache;

use libris_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID '{}': {}", value, e)))
}

pub(crate) fn parse_json(value: &str) -> Result<serde_json::Value> {
    serde_json::from_str(value).map_err(|e| Error::Internal(format!("Invalid stored JSON: {}", e)))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    // Single connection that never idles out, so the in-memory database survives
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await.unwrap();
    libris_common::db::init_schema(&pool).await.unwrap();
    pool
}
