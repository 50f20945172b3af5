//! User credit balance operations
//!
//! Each mutation is one SQL statement; `deduct` carries its own guard so the
//! stored balance can never drop below zero.

use chrono::{DateTime, Utc};
use libris_common::time::to_db_timestamp;
use libris_common::Result;
use sqlx::{Row, SqlitePool};

/// Stored credit state of one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredits {
    /// `None` until the starter grant or a top-up runs
    pub credits: Option<i64>,
    pub starter_granted: bool,
}

pub async fn load_credits(pool: &SqlitePool, user_id: &str) -> Result<Option<UserCredits>> {
    let row = sqlx::query("SELECT credits, starter_granted_at FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| {
        let granted_at: Option<String> = r.get("starter_granted_at");
        UserCredits {
            credits: r.get("credits"),
            starter_granted: granted_at.is_some(),
        }
    }))
}

/// Create the user row if missing (credits stay absent)
pub async fn ensure_user(pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("INSERT INTO users (id, credits, created_at) VALUES (?, NULL, ?) ON CONFLICT(id) DO NOTHING")
        .bind(user_id)
        .bind(to_db_timestamp(now))
        .execute(pool)
        .await?;
    Ok(())
}

/// Subtract `cost` when the balance covers it
///
/// Returns the new balance, or `None` when the balance was absent or short.
pub async fn deduct(pool: &SqlitePool, user_id: &str, cost: i64) -> Result<Option<i64>> {
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET credits = credits - ?
        WHERE id = ? AND credits IS NOT NULL AND credits >= ?
        RETURNING credits
        "#,
    )
    .bind(cost)
    .bind(user_id)
    .bind(cost)
    .fetch_optional(pool)
    .await?;

    Ok(balance)
}

/// Add `amount`, creating the user if needed; returns the new balance
pub async fn grant(pool: &SqlitePool, user_id: &str, amount: i64, now: DateTime<Utc>) -> Result<i64> {
    let balance: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (id, credits, created_at) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET credits = COALESCE(users.credits, 0) + excluded.credits
        RETURNING credits
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(to_db_timestamp(now))
    .fetch_one(pool)
    .await?;

    Ok(balance)
}

/// Apply the starter grant once
///
/// Only when the balance is absent or zero and no starter grant was recorded.
/// Returns the new balance when granted.
pub async fn grant_starter(pool: &SqlitePool, user_id: &str, amount: i64, now: DateTime<Utc>) -> Result<Option<i64>> {
    ensure_user(pool, user_id, now).await?;

    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET credits = COALESCE(credits, 0) + ?, starter_granted_at = ?
        WHERE id = ? AND COALESCE(credits, 0) = 0 AND starter_granted_at IS NULL
        RETURNING credits
        "#,
    )
    .bind(amount)
    .bind(to_db_timestamp(now))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(balance)
}
