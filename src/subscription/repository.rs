//! Subscription repository for feedrelay.

use chrono::Utc;

use super::types::{NewSubscription, Subscription};
use crate::db::{parse_datetime, DbPool};
use crate::{FeedRelayError, Result};

/// Row type for subscription from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    subscriber_id: i64,
    source_id: i64,
    interval_minutes: i64,
    enable_notification: bool,
    enable_telegraph: bool,
    tag: String,
    wait_time: i64,
    created_at: String,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            id: row.id,
            subscriber_id: row.subscriber_id,
            source_id: row.source_id,
            interval_minutes: row.interval_minutes,
            enable_notification: row.enable_notification,
            enable_telegraph: row.enable_telegraph,
            tag: row.tag,
            wait_time: row.wait_time,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, subscriber_id, source_id, interval_minutes, \
     enable_notification, enable_telegraph, tag, wait_time, created_at FROM subscriptions";

/// Repository for subscription operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new subscription.
    pub async fn create(&self, sub: &NewSubscription) -> Result<Subscription> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (subscriber_id, source_id, interval_minutes, enable_notification,
                 enable_telegraph, tag, wait_time)
            VALUES ($1, $2, $3, 1, 1, '', $4)
            "#,
        )
        .bind(sub.subscriber_id)
        .bind(sub.source_id)
        .bind(sub.interval_minutes)
        .bind(sub.interval_minutes)
        .execute(self.pool)
        .await?;

        self.get(sub.subscriber_id, sub.source_id)
            .await?
            .ok_or_else(|| FeedRelayError::NotFound("subscription".into()))
    }

    /// Check whether a subscriber is subscribed to a source.
    pub async fn exists(&self, subscriber_id: i64, source_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = $1 AND source_id = $2)",
        )
        .bind(subscriber_id)
        .bind(source_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Get the subscription of a subscriber to a source.
    pub async fn get(&self, subscriber_id: i64, source_id: i64) -> Result<Option<Subscription>> {
        let query = format!("{} WHERE subscriber_id = $1 AND source_id = $2", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(subscriber_id)
            .bind(source_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Subscription::from))
    }

    /// List subscriptions of a subscriber (newest first).
    pub async fn list_by_subscriber(&self, subscriber_id: i64) -> Result<Vec<Subscription>> {
        let query = format!(
            "{} WHERE subscriber_id = $1 ORDER BY created_at DESC, id DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(subscriber_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    /// List subscriptions pointing at a source.
    pub async fn list_by_source(&self, source_id: i64) -> Result<Vec<Subscription>> {
        let query = format!("{} WHERE source_id = $1 ORDER BY id ASC", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(source_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    /// List every subscription.
    pub async fn list_all(&self) -> Result<Vec<Subscription>> {
        let query = format!("{} ORDER BY id ASC", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    /// Count subscriptions pointing at a source.
    pub async fn count_by_source(&self, source_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE source_id = $1")
            .bind(source_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Replace the settings of an existing subscription.
    pub async fn update(&self, sub: &Subscription) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET interval_minutes = $1,
                enable_notification = $2,
                enable_telegraph = $3,
                tag = $4,
                wait_time = $5,
                updated_at = datetime('now')
            WHERE subscriber_id = $6 AND source_id = $7
            "#,
        )
        .bind(sub.interval_minutes)
        .bind(sub.enable_notification)
        .bind(sub.enable_telegraph)
        .bind(&sub.tag)
        .bind(sub.wait_time)
        .bind(sub.subscriber_id)
        .bind(sub.source_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set only the wait counter of a subscription.
    pub async fn set_wait_time(
        &self,
        subscriber_id: i64,
        source_id: i64,
        wait_time: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE subscriptions SET wait_time = $1 WHERE subscriber_id = $2 AND source_id = $3",
        )
        .bind(wait_time)
        .bind(subscriber_id)
        .bind(source_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the subscription of a subscriber to a source.
    pub async fn delete(&self, subscriber_id: i64, source_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND source_id = $2")
                .bind(subscriber_id)
                .bind(source_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_subscription_defaults() {
        let db = setup_db().await;
        let repo = SubscriptionRepository::new(db.pool());

        let sub = repo.create(&NewSubscription::new(100, 1, 10)).await.unwrap();

        assert_eq!(sub.subscriber_id, 100);
        assert_eq!(sub.source_id, 1);
        assert_eq!(sub.interval_minutes, 10);
        assert_eq!(sub.wait_time, 10);
        assert!(sub.enable_notification);
        assert!(sub.enable_telegraph);
        assert!(sub.tag_label().is_none());
    }

    #[tokio::test]
    async fn test_pair_is_unique() {
        let db = setup_db().await;
        let repo = SubscriptionRepository::new(db.pool());

        repo.create(&NewSubscription::new(100, 1, 10)).await.unwrap();
        let result = repo.create(&NewSubscription::new(100, 1, 10)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let db = setup_db().await;
        let repo = SubscriptionRepository::new(db.pool());

        repo.create(&NewSubscription::new(100, 1, 10)).await.unwrap();
        assert!(repo.exists(100, 1).await.unwrap());
        assert!(!repo.exists(100, 2).await.unwrap());

        assert!(repo.delete(100, 1).await.unwrap());
        assert!(!repo.exists(100, 1).await.unwrap());
        assert!(!repo.delete(100, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let db = setup_db().await;
        let repo = SubscriptionRepository::new(db.pool());

        repo.create(&NewSubscription::new(100, 1, 10)).await.unwrap();
        repo.create(&NewSubscription::new(100, 2, 10)).await.unwrap();
        repo.create(&NewSubscription::new(200, 1, 5)).await.unwrap();

        assert_eq!(repo.list_by_subscriber(100).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_source(1).await.unwrap().len(), 2);
        assert_eq!(repo.count_by_source(1).await.unwrap(), 2);
        assert_eq!(repo.count_by_source(2).await.unwrap(), 1);
        assert_eq!(repo.count_by_source(3).await.unwrap(), 0);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_settings() {
        let db = setup_db().await;
        let repo = SubscriptionRepository::new(db.pool());

        let mut sub = repo.create(&NewSubscription::new(100, 1, 10)).await.unwrap();
        sub.enable_notification = false;
        sub.enable_telegraph = false;
        sub.tag = "#rust".to_string();
        sub.interval_minutes = 30;
        assert!(repo.update(&sub).await.unwrap());

        let reloaded = repo.get(100, 1).await.unwrap().unwrap();
        assert!(!reloaded.enable_notification);
        assert!(!reloaded.enable_telegraph);
        assert_eq!(reloaded.tag_label(), Some("#rust"));
        assert_eq!(reloaded.interval_minutes, 30);
    }

    #[tokio::test]
    async fn test_set_wait_time() {
        let db = setup_db().await;
        let repo = SubscriptionRepository::new(db.pool());

        repo.create(&NewSubscription::new(100, 1, 10)).await.unwrap();
        assert!(repo.set_wait_time(100, 1, 3).await.unwrap());
        assert_eq!(repo.get(100, 1).await.unwrap().unwrap().wait_time, 3);
        assert!(!repo.set_wait_time(100, 9, 3).await.unwrap());
    }
}
