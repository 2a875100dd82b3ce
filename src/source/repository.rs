//! Source repository for feedrelay.

use chrono::Utc;

use super::types::{NewSource, Source};
use crate::db::{parse_datetime, DbPool};
use crate::{FeedRelayError, Result};

/// Row type for source from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: i64,
    link: String,
    title: String,
    error_count: i64,
    created_at: String,
    updated_at: String,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            link: row.link,
            title: row.title,
            error_count: row.error_count,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_datetime(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for source operations.
pub struct SourceRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SourceRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new source.
    pub async fn create(&self, source: &NewSource) -> Result<Source> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sources (link, title, error_count)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&source.link)
        .bind(&source.title)
        .bind(source.error_count)
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| FeedRelayError::NotFound("source".into()))
    }

    /// Get a source by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, link, title, error_count, created_at, updated_at
            FROM sources
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Source::from))
    }

    /// Get a source by its canonical link.
    pub async fn get_by_link(&self, link: &str) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, link, title, error_count, created_at, updated_at
            FROM sources
            WHERE link = $1
            "#,
        )
        .bind(link)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Source::from))
    }

    /// List all sources (ordered by id).
    pub async fn list_all(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, link, title, error_count, created_at, updated_at
            FROM sources
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Replace a source's metadata and failure counter, inserting it if missing.
    pub async fn upsert(&self, source: &Source) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (id, link, title, error_count)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(id) DO UPDATE SET
                link = excluded.link,
                title = excluded.title,
                error_count = excluded.error_count,
                updated_at = datetime('now')
            "#,
        )
        .bind(source.id)
        .bind(&source.link)
        .bind(&source.title)
        .bind(source.error_count)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete a source. Content and subscriptions are not touched.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all sources.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
