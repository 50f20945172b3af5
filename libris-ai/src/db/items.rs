//! Item database operations

use chrono::{DateTime, Utc};
use libris_common::time::{parse_db_timestamp, to_db_timestamp};
use libris_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;
use crate::models::Item;

/// Save a new item
pub async fn insert_item(pool: &SqlitePool, item: &Item) -> Result<()> {
    let tags = serde_json::to_string(&item.tags)
        .map_err(|e| Error::Internal(format!("Serialize tags failed: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO items (
            id, owner_id, media_type, title, creator, external_id,
            description, tags, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id.to_string())
    .bind(&item.owner_id)
    .bind(item.media_type.as_str())
    .bind(&item.title)
    .bind(&item.creator)
    .bind(&item.external_id)
    .bind(&item.description)
    .bind(tags)
    .bind(to_db_timestamp(item.created_at))
    .bind(to_db_timestamp(item.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load item by id
pub async fn load_item(pool: &SqlitePool, id: Uuid) -> Result<Option<Item>> {
    let row = sqlx::query(
        r#"
        SELECT id, owner_id, media_type, title, creator, external_id,
               description, tags, created_at, updated_at
        FROM items
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| item_from_row(&r)).transpose()
}

/// Apply generated details inside the writer's transaction
///
/// `description` is `None` when the existing description is kept.
pub async fn apply_details(
    conn: &mut SqliteConnection,
    id: Uuid,
    description: Option<&str>,
    tags: &[String],
    now: DateTime<Utc>,
) -> Result<bool> {
    let tags = serde_json::to_string(tags)
        .map_err(|e| Error::Internal(format!("Serialize tags failed: {}", e)))?;

    let result = sqlx::query(
        r#"
        UPDATE items
        SET description = COALESCE(?, description),
            tags = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(description)
    .bind(tags)
    .bind(to_db_timestamp(now))
    .bind(id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an item; its enrichment slots cascade
pub async fn delete_item(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn item_from_row(row: &SqliteRow) -> Result<Item> {
    let id: String = row.get("id");
    let media_type: String = row.get("media_type");
    let tags: String = row.get("tags");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Item {
        id: parse_uuid(&id)?,
        owner_id: row.get("owner_id"),
        media_type: media_type.parse().map_err(Error::Internal)?,
        title: row.get("title"),
        creator: row.get("creator"),
        external_id: row.get("external_id"),
        description: row.get("description"),
        tags: serde_json::from_str(&tags)
            .map_err(|e| Error::Internal(format!("Invalid tags JSON: {}", e)))?,
        created_at: parse_db_timestamp(&created_at)?,
        updated_at: parse_db_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::{MediaType, NewItem};

    fn sample() -> Item {
        Item::new(
            &NewItem {
                owner_id: "user-1".into(),
                media_type: MediaType::Movie,
                title: "The Matrix".into(),
                creator: "The Wachowskis".into(),
                external_id: Some("603".into()),
                description: "Short".into(),
                auto_enrich: false,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let pool = test_pool().await;
        let item = sample();
        insert_item(&pool, &item).await.unwrap();

        let loaded = load_item(&pool, item.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "The Matrix");
        assert_eq!(loaded.media_type, MediaType::Movie);
        assert_eq!(loaded.external_id.as_deref(), Some("603"));
        assert_eq!(loaded.created_at.timestamp_millis(), item.created_at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_load_missing_item() {
        let pool = test_pool().await;
        assert!(load_item(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_details_keeps_description_when_none() {
        let pool = test_pool().await;
        let item = sample();
        insert_item(&pool, &item).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let tags = vec!["sci-fi".to_string()];
        assert!(apply_details(&mut conn, item.id, None, &tags, Utc::now()).await.unwrap());
        drop(conn);

        let loaded = load_item(&pool, item.id).await.unwrap().unwrap();
        assert_eq!(loaded.description, "Short");
        assert_eq!(loaded.tags, tags);
    }
}
