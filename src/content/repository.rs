//! Content ledger repository for feedrelay.

use chrono::Utc;

use super::types::{Content, NewContent};
use crate::db::{parse_datetime, DbPool};
use crate::Result;

/// Row type for content from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ContentRow {
    id: i64,
    source_id: i64,
    raw_id: String,
    hash_id: String,
    title: String,
    description: String,
    raw_link: String,
    telegraph_url: Option<String>,
    created_at: String,
}

impl From<ContentRow> for Content {
    fn from(row: ContentRow) -> Self {
        Content {
            id: row.id,
            source_id: row.source_id,
            raw_id: row.raw_id,
            hash_id: row.hash_id,
            title: row.title,
            description: row.description,
            raw_link: row.raw_link,
            telegraph_url: row.telegraph_url.filter(|u| !u.is_empty()),
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for content operations.
pub struct ContentRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ContentRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a content item, ignoring it if the fingerprint already exists for the source.
    ///
    /// Returns `None` when nothing was inserted.
    pub async fn create(&self, content: &NewContent) -> Result<Option<Content>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO contents
                (source_id, raw_id, hash_id, title, description, raw_link, telegraph_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(source_id, hash_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(content.source_id)
        .bind(&content.raw_id)
        .bind(&content.hash_id)
        .bind(&content.title)
        .bind(&content.description)
        .bind(&content.raw_link)
        .bind(&content.telegraph_url)
        .fetch_optional(self.pool)
        .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Get a content item by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Content>> {
        let row = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT id, source_id, raw_id, hash_id, title, description, raw_link,
                   telegraph_url, created_at
            FROM contents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Content::from))
    }

    /// Check whether a fingerprint has been ingested.
    pub async fn exists_by_fingerprint(&self, hash_id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM contents WHERE hash_id = $1)")
                .bind(hash_id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// List content of a source (oldest first).
    pub async fn list_by_source(&self, source_id: i64) -> Result<Vec<Content>> {
        let rows = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT id, source_id, raw_id, hash_id, title, description, raw_link,
                   telegraph_url, created_at
            FROM contents
            WHERE source_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(source_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Content::from).collect())
    }

    /// Count content of a source.
    pub async fn count_by_source(&self, source_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents WHERE source_id = $1")
            .bind(source_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Delete all content of a source, returning the number of deleted rows.
    pub async fn delete_all_by_source(&self, source_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM contents WHERE source_id = $1")
            .bind(source_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
