//! Database initialization
//!
//! Creates the record store tables on first run. Every statement is
//! `IF NOT EXISTS`, so initialization is safe to repeat at each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout used while the settings table is being read
const BOOTSTRAP_BUSY_TIMEOUT_MS: u64 = 250;

/// Initialize database connection and create tables if needed
///
/// A single-connection bootstrap pool creates the schema and reads the
/// configured busy timeout; the returned pool then applies foreign keys, WAL
/// and that timeout on every connection it opens.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL lets the HTTP handlers read while a poller pass writes
        .journal_mode(SqliteJournalMode::Wal);

    let bootstrap = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            options
                .clone()
                .busy_timeout(Duration::from_millis(BOOTSTRAP_BUSY_TIMEOUT_MS)),
        )
        .await?;

    init_schema(&bootstrap).await?;

    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'database_lock_retry_ms'",
    )
    .fetch_optional(&bootstrap)
    .await?
    .unwrap_or(BOOTSTRAP_BUSY_TIMEOUT_MS as i64);
    let timeout_ms = timeout_ms.max(0) as u64;

    bootstrap.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options.busy_timeout(Duration::from_millis(timeout_ms)))
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }
    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Create all tables and default settings on an open pool
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_items_table(pool).await?;
    create_enrichments_table(pool).await?;
    create_work_cache_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    // credits is NULL until the starter grant runs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            credits INTEGER CHECK (credits IS NULL OR credits >= 0),
            starter_granted_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            media_type TEXT NOT NULL CHECK (media_type IN ('book', 'movie')),
            title TEXT NOT NULL,
            creator TEXT NOT NULL DEFAULT '',
            external_id TEXT,
            description TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_owner ON items(owner_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_enrichments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrichments (
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
            result TEXT,
            note TEXT,
            cache_key TEXT,
            force_refresh INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (item_id, kind),
            CHECK ((status = 'completed') = (result IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Poller and reaper both filter by (kind, status) and order by updated_at
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_enrichments_kind_status ON enrichments(kind, status, updated_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_work_cache_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_cache (
            kind TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            title TEXT NOT NULL,
            creator TEXT,
            external_id TEXT,
            status TEXT NOT NULL,
            result TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (kind, natural_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "database_lock_retry_ms", "250").await?;
    ensure_setting(pool, "database_max_lock_wait_ms", "5000").await?;
    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE tolerates two processes initializing at once
    let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
    }

    Ok(())
}
