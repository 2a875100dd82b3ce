//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use feedrelay::{
    CircuitBreaker, Database, DeliveryTransport, Dispatcher, FeedItem, FeedRelayError,
    FeedService, FeedTransport, Message, ParsedFeed, Pipeline, Result, Scheduler, Transcoder,
};

/// Feed transport serving scripted documents per link.
#[derive(Default)]
pub struct ScriptedTransport {
    feeds: Mutex<HashMap<String, Vec<FeedItem>>>,
    failing: Mutex<HashMap<String, bool>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    /// Serve `items` for `link`.
    pub fn set_items(&self, link: &str, items: Vec<FeedItem>) {
        self.feeds.lock().unwrap().insert(link.to_string(), items);
    }

    /// Append an item to the document of `link`.
    pub fn push_item(&self, link: &str, item: FeedItem) {
        self.feeds
            .lock()
            .unwrap()
            .entry(link.to_string())
            .or_default()
            .push(item);
    }

    /// Make fetches of `link` fail or succeed.
    pub fn set_failing(&self, link: &str, failing: bool) {
        self.failing.lock().unwrap().insert(link.to_string(), failing);
    }

    /// Number of fetches of `link` so far.
    pub fn fetch_count(&self, link: &str) -> usize {
        self.fetches.lock().unwrap().get(link).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn fetch(&self, link: &str) -> Result<ParsedFeed> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(link.to_string())
            .or_default() += 1;

        if self.failing.lock().unwrap().get(link).copied().unwrap_or(false) {
            return Err(FeedRelayError::Fetch(format!("{} unreachable", link)));
        }

        let items = self
            .feeds
            .lock()
            .unwrap()
            .get(link)
            .cloned()
            .unwrap_or_default();
        Ok(ParsedFeed {
            title: "Example Feed".to_string(),
            items,
        })
    }
}

/// Delivery transport recording every message.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(i64, Message)>>,
}

impl RecordingTransport {
    /// Messages sent so far.
    pub fn sent(&self) -> Vec<(i64, Message)> {
        self.sent.lock().unwrap().clone()
    }

    /// Subscribers that received at least one message, sorted.
    pub fn recipients(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.sent.lock().unwrap().iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[async_trait]
impl DeliveryTransport for RecordingTransport {
    async fn send(&self, subscriber_id: i64, message: &Message) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subscriber_id, message.clone()));
        Ok(())
    }
}

/// Transcoder that always fails.
pub struct FailingTranscoder;

#[async_trait]
impl Transcoder for FailingTranscoder {
    async fn publish(
        &self,
        _source_title: &str,
        _item_title: &str,
        _item_link: &str,
        _item_body: &str,
    ) -> Result<String> {
        Err(FeedRelayError::Transcode("service unavailable".to_string()))
    }
}

/// A wired relay over an in-memory database.
pub struct Harness {
    pub db: Arc<Database>,
    pub feeds: Arc<ScriptedTransport>,
    pub delivery: Arc<RecordingTransport>,
    pub pipeline: Arc<Pipeline>,
    pub scheduler: Scheduler,
    pub breaker: CircuitBreaker,
}

impl Harness {
    /// Relay with the given breaker threshold and a one-tick default interval.
    pub async fn new(threshold: i64) -> Self {
        Self::build(threshold, None).await
    }

    /// Relay whose pipeline transcodes every non-empty body.
    pub async fn with_transcoder(threshold: i64, transcoder: Arc<dyn Transcoder>) -> Self {
        Self::build(threshold, Some(transcoder)).await
    }

    async fn build(threshold: i64, transcoder: Option<Arc<dyn Transcoder>>) -> Self {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let feeds = Arc::new(ScriptedTransport::default());
        let delivery = Arc::new(RecordingTransport::default());
        let breaker = CircuitBreaker::new(threshold);

        let mut pipeline = Pipeline::new(Arc::clone(&db), feeds.clone()).with_concurrency(4);
        if let Some(transcoder) = transcoder {
            pipeline = pipeline.with_transcoder(transcoder, 0);
        }
        let pipeline = Arc::new(pipeline);
        let dispatcher = Arc::new(Dispatcher::new(delivery.clone(), 0, 4));
        let scheduler = Scheduler::new(
            Arc::clone(&db),
            Arc::clone(&pipeline),
            dispatcher,
            breaker,
            60,
        );

        Self {
            db,
            feeds,
            delivery,
            pipeline,
            scheduler,
            breaker,
        }
    }

    /// Service with a default interval of one tick.
    pub fn service(&self) -> FeedService<'_> {
        FeedService::new(&self.db, &self.pipeline, self.breaker, 1)
    }

    /// Run one tick.
    pub async fn tick(&self) -> feedrelay::TickReport {
        self.scheduler.tick().await.unwrap()
    }
}

/// Shorthand for a feed item whose link derives from its id.
pub fn item(id: &str) -> FeedItem {
    FeedItem::new(id, format!("Item {}", id), format!("https://example.com/posts/{}", id))
        .with_body(format!("<p>Body of {}</p>", id))
}
