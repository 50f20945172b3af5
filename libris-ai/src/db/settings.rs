//! Settings database operations
//!
//! Key/value accessors over the `settings` table.

use sqlx::{Pool, Sqlite};
use libris_common::{Error, Result};

pub const AI_API_KEY: &str = "ai_api_key";
const MAX_LOCK_WAIT_MS: &str = "database_max_lock_wait_ms";

/// Get the generative provider API key from the database
///
/// **Returns:** Some(key) if exists, None if not set
pub async fn get_ai_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, AI_API_KEY).await
}

pub async fn set_ai_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, AI_API_KEY, key).await
}

/// Upper bound for `retry_on_lock` (default 5000 ms)
pub async fn get_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, MAX_LOCK_WAIT_MS).await.map(|opt| opt.unwrap_or(5000))
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT value FROM settings WHERE key = ?"
    )
    .bind(key)
    .fetch_optional(db)
    .await
    .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value.parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value"
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_ai_api_key_not_set() {
        let pool = test_pool().await;
        assert_eq!(get_ai_api_key(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_ai_api_key_upserts() {
        let pool = test_pool().await;

        set_ai_api_key(&pool, "old_key".to_string()).await.unwrap();
        set_ai_api_key(&pool, "new_key".to_string()).await.unwrap();

        assert_eq!(get_ai_api_key(&pool).await.unwrap(), Some("new_key".to_string()));
    }

    #[tokio::test]
    async fn test_max_lock_wait_default_seeded() {
        let pool = test_pool().await;
        assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 5000);
    }

    #[tokio::test]
    async fn test_parse_failure_is_config_error() {
        let pool = test_pool().await;
        set_setting(&pool, MAX_LOCK_WAIT_MS, "soon").await.unwrap();

        let err = get_max_lock_wait_ms(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
