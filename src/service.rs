//! Subscription management service.
//!
//! High-level operations used by the command surface: subscribing to links,
//! unsubscribing with source cleanup, per-subscription settings and
//! pausing or resuming sources.

use futures::future::join_all;
use tracing::{error, info};

use crate::db::Database;
use crate::feed::validate_url;
use crate::pipeline::Pipeline;
use crate::source::{BreakerState, CircuitBreaker, NewSource, Source, SourceRepository};
use crate::subscription::{
    format_tags, NewSubscription, Subscription, SubscriptionRepository, MAX_TAGS,
};
use crate::{FeedRelayError, Result};

/// Everything a settings view shows for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSettings {
    /// The subscribed source.
    pub source: Source,
    /// The subscription itself.
    pub subscription: Subscription,
    /// Breaker state of the source.
    pub state: BreakerState,
}

/// Service for subscription management.
pub struct FeedService<'a> {
    db: &'a Database,
    pipeline: &'a Pipeline,
    breaker: CircuitBreaker,
    default_interval: i64,
}

impl<'a> FeedService<'a> {
    /// Create a new FeedService.
    pub fn new(
        db: &'a Database,
        pipeline: &'a Pipeline,
        breaker: CircuitBreaker,
        default_interval: i64,
    ) -> Self {
        Self {
            db,
            pipeline,
            breaker,
            default_interval: default_interval.max(1),
        }
    }

    /// Get the source for a link, creating and ingesting it if it is new.
    ///
    /// The initial ingestion is never dispatched: the source stays paused while
    /// its current items are stored and is resumed afterwards.
    pub async fn create_source(&self, link: &str) -> Result<Source> {
        let link = link.trim();
        let repo = SourceRepository::new(self.db.pool());

        if let Some(source) = repo.get_by_link(link).await? {
            return Ok(source);
        }

        validate_url(link)?;
        let feed = self.pipeline.fetch(link).await?;
        let title = if feed.title.is_empty() {
            link.to_string()
        } else {
            feed.title
        };

        let new_source = NewSource::new(link, title).with_error_count(self.breaker.paused_count());
        let source = match repo.create(&new_source).await {
            Ok(source) => source,
            // Lost a race with a concurrent subscribe to the same link
            Err(e) => match repo.get_by_link(link).await? {
                Some(existing) => return Ok(existing),
                None => return Err(e),
            },
        };

        let stored = self.pipeline.ingest(&source, feed.items).await;
        self.breaker.resume(self.db.pool(), source.id).await?;
        info!(
            "Created source {} ({}) with {} item(s)",
            source.id,
            source.link,
            stored.len()
        );

        repo.get_by_id(source.id)
            .await?
            .ok_or_else(|| FeedRelayError::NotFound(format!("source {}", source.id)))
    }

    /// Subscribe a subscriber to an existing source.
    pub async fn subscribe(&self, subscriber_id: i64, source_id: i64) -> Result<Subscription> {
        if SourceRepository::new(self.db.pool())
            .get_by_id(source_id)
            .await?
            .is_none()
        {
            return Err(FeedRelayError::NotFound(format!("source {}", source_id)));
        }

        let subs = SubscriptionRepository::new(self.db.pool());
        if subs.exists(subscriber_id, source_id).await? {
            return Err(FeedRelayError::AlreadySubscribed(source_id));
        }

        let sub = subs
            .create(&NewSubscription::new(
                subscriber_id,
                source_id,
                self.default_interval,
            ))
            .await?;
        info!("Subscriber {} subscribed to source {}", subscriber_id, source_id);
        Ok(sub)
    }

    /// Subscribe a subscriber to a link, creating the source if needed.
    pub async fn subscribe_link(
        &self,
        subscriber_id: i64,
        link: &str,
    ) -> Result<(Source, Subscription)> {
        let source = self.create_source(link).await?;
        let sub = self.subscribe(subscriber_id, source.id).await?;
        Ok((source, sub))
    }

    /// Remove a subscription, deleting the source and its content when it was
    /// the last one.
    pub async fn unsubscribe(&self, subscriber_id: i64, source_id: i64) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        let deleted =
            sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND source_id = $2")
                .bind(subscriber_id)
                .bind(source_id)
                .execute(&mut *tx)
                .await?;
        if deleted.rows_affected() == 0 {
            return Err(FeedRelayError::NotFound(format!(
                "subscription to source {}",
                source_id
            )));
        }

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE source_id = $1")
                .bind(source_id)
                .fetch_one(&mut *tx)
                .await?;

        // The last subscription takes the source and its ledger with it
        let mut removed = None;
        if remaining == 0 {
            let contents = sqlx::query("DELETE FROM contents WHERE source_id = $1")
                .bind(source_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM sources WHERE id = $1")
                .bind(source_id)
                .execute(&mut *tx)
                .await?;
            removed = Some(contents.rows_affected());
        }

        tx.commit().await?;

        info!(
            "Subscriber {} unsubscribed from source {}",
            subscriber_id, source_id
        );
        if let Some(removed) = removed {
            info!(
                "Deleted source {} and {} content item(s)",
                source_id, removed
            );
        }
        Ok(())
    }

    /// Remove every subscription of a subscriber, returning how many were removed.
    pub async fn unsubscribe_all(&self, subscriber_id: i64) -> Result<usize> {
        let subs = SubscriptionRepository::new(self.db.pool())
            .list_by_subscriber(subscriber_id)
            .await?;

        let results = join_all(
            subs.iter()
                .map(|sub| self.unsubscribe(subscriber_id, sub.source_id)),
        )
        .await;

        let mut removed = 0;
        for (sub, result) in subs.iter().zip(results) {
            match result {
                Ok(()) => removed += 1,
                Err(e) => error!(
                    "Subscriber {} unsubscribe from {} failed: {}",
                    subscriber_id, sub.source_id, e
                ),
            }
        }
        Ok(removed)
    }

    /// Sources a subscriber is subscribed to (newest subscription first).
    pub async fn subscribed_sources(&self, subscriber_id: i64) -> Result<Vec<Source>> {
        let subs = SubscriptionRepository::new(self.db.pool())
            .list_by_subscriber(subscriber_id)
            .await?;
        let repo = SourceRepository::new(self.db.pool());

        let mut sources = Vec::with_capacity(subs.len());
        for sub in subs {
            if let Some(source) = repo.get_by_id(sub.source_id).await? {
                sources.push(source);
            }
        }
        Ok(sources)
    }

    /// Replace the tags of a subscription. An empty list clears them.
    pub async fn set_tags<S: AsRef<str>>(
        &self,
        subscriber_id: i64,
        source_id: i64,
        tags: &[S],
    ) -> Result<Subscription> {
        let count = tags.iter().filter(|t| !t.as_ref().trim().is_empty()).count();
        if count > MAX_TAGS {
            return Err(FeedRelayError::Validation(format!(
                "at most {} tags are allowed",
                MAX_TAGS
            )));
        }

        let mut sub = self.subscription(subscriber_id, source_id).await?;
        sub.tag = format_tags(tags);
        self.save(&sub).await?;
        Ok(sub)
    }

    /// Set the poll interval of several subscriptions.
    pub async fn set_interval(
        &self,
        subscriber_id: i64,
        source_ids: &[i64],
        minutes: i64,
    ) -> Result<()> {
        if minutes <= 0 {
            return Err(FeedRelayError::Validation(
                "interval must be positive".to_string(),
            ));
        }

        for &source_id in source_ids {
            let mut sub = self.subscription(subscriber_id, source_id).await?;
            sub.interval_minutes = minutes;
            // A shorter interval takes effect without waiting out the old one
            sub.wait_time = sub.wait_time.min(minutes);
            self.save(&sub).await?;
        }
        Ok(())
    }

    /// Flip the notification flag of a subscription.
    pub async fn toggle_notification(
        &self,
        subscriber_id: i64,
        source_id: i64,
    ) -> Result<Subscription> {
        let mut sub = self.subscription(subscriber_id, source_id).await?;
        sub.enable_notification = !sub.enable_notification;
        self.save(&sub).await?;
        Ok(sub)
    }

    /// Flip the transcoding flag of a subscription.
    pub async fn toggle_telegraph(
        &self,
        subscriber_id: i64,
        source_id: i64,
    ) -> Result<Subscription> {
        let mut sub = self.subscription(subscriber_id, source_id).await?;
        sub.enable_telegraph = !sub.enable_telegraph;
        self.save(&sub).await?;
        Ok(sub)
    }

    /// Stop polling a source.
    pub async fn pause_source(&self, source_id: i64) -> Result<BreakerState> {
        self.breaker.pause(self.db.pool(), source_id).await
    }

    /// Resume polling a source and clear its failure counter.
    pub async fn resume_source(&self, source_id: i64) -> Result<BreakerState> {
        self.breaker.resume(self.db.pool(), source_id).await
    }

    /// Pause an eligible source or resume a disabled one.
    pub async fn toggle_source(&self, source_id: i64) -> Result<BreakerState> {
        self.breaker.toggle(self.db.pool(), source_id).await
    }

    /// Pause every source of a subscriber, returning how many were paused.
    pub async fn pause_all(&self, subscriber_id: i64) -> Result<usize> {
        let sources = self.subscribed_sources(subscriber_id).await?;
        for source in &sources {
            self.pause_source(source.id).await?;
        }
        Ok(sources.len())
    }

    /// Resume every source of a subscriber, returning how many were resumed.
    pub async fn resume_all(&self, subscriber_id: i64) -> Result<usize> {
        let sources = self.subscribed_sources(subscriber_id).await?;
        for source in &sources {
            self.resume_source(source.id).await?;
        }
        Ok(sources.len())
    }

    /// Source, subscription and breaker state for a settings view.
    pub async fn subscription_settings(
        &self,
        subscriber_id: i64,
        source_id: i64,
    ) -> Result<SubscriptionSettings> {
        let subscription = self.subscription(subscriber_id, source_id).await?;
        let source = SourceRepository::new(self.db.pool())
            .get_by_id(source_id)
            .await?
            .ok_or_else(|| FeedRelayError::NotFound(format!("source {}", source_id)))?;
        let state = self.breaker.state(source.error_count);

        Ok(SubscriptionSettings {
            source,
            subscription,
            state,
        })
    }

    async fn subscription(&self, subscriber_id: i64, source_id: i64) -> Result<Subscription> {
        SubscriptionRepository::new(self.db.pool())
            .get(subscriber_id, source_id)
            .await?
            .ok_or_else(|| {
                FeedRelayError::NotFound(format!("subscription to source {}", source_id))
            })
    }

    async fn save(&self, sub: &Subscription) -> Result<()> {
        SubscriptionRepository::new(self.db.pool())
            .update(sub)
            .await?;
        Ok(())
    }
}
