//! Fetch-parse-dedup pipeline.
//!
//! Turns a source's feed document into the set of content items that were
//! never seen before. Per-item persistence runs concurrently, bounded by a
//! semaphore, and the cycle completes only after every item task has finished.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::content::{fingerprint, Content, ContentRepository, NewContent};
use crate::db::Database;
use crate::feed::{FeedItem, FeedTransport, ParsedFeed};
use crate::source::Source;
use crate::transcode::Transcoder;
use crate::Result;

/// Default number of items processed at once.
pub const DEFAULT_MAX_CONCURRENT_ITEMS: usize = 8;

/// Fetch-parse-dedup pipeline for a single source.
pub struct Pipeline {
    db: Arc<Database>,
    transport: Arc<dyn FeedTransport>,
    transcoder: Option<Arc<dyn Transcoder>>,
    min_body_length: usize,
    max_concurrent: usize,
}

impl Pipeline {
    /// Create a pipeline without transcoding.
    pub fn new(db: Arc<Database>, transport: Arc<dyn FeedTransport>) -> Self {
        Self {
            db,
            transport,
            transcoder: None,
            min_body_length: 0,
            max_concurrent: DEFAULT_MAX_CONCURRENT_ITEMS,
        }
    }

    /// Limit how many items of one document are stored at once.
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Transcode items whose body is longer than `min_body_length` characters.
    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>, min_body_length: usize) -> Self {
        self.transcoder = Some(transcoder);
        self.min_body_length = min_body_length;
        self
    }

    /// Fetch and parse the feed behind a link.
    pub async fn fetch(&self, link: &str) -> Result<ParsedFeed> {
        self.transport.fetch(link).await
    }

    /// Run one cycle for a source, returning the newly ingested items.
    ///
    /// A fetch or parse failure is returned as an error; a successful fetch
    /// with nothing new yields an empty list.
    pub async fn run(&self, source: &Source) -> Result<Vec<Content>> {
        let feed = self.fetch(&source.link).await?;
        let created = self.ingest(source, feed.items).await;

        if created.is_empty() {
            debug!("Source {} fetched: no new items", source.id);
        } else {
            info!("Source {} fetched: {} new item(s)", source.id, created.len());
        }
        Ok(created)
    }

    /// Persist every unseen item of a source.
    ///
    /// Persistence failures are logged and the item is dropped for this cycle.
    pub async fn ingest(&self, source: &Source, items: Vec<FeedItem>) -> Vec<Content> {
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        for item in items {
            if item.origin_id.is_empty() {
                debug!("Source {}: skipping item without identifier", source.id);
                continue;
            }
            let hash_id = fingerprint(&source.link, &item.origin_id);
            if !seen.insert(hash_id.clone()) {
                continue;
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let db = Arc::clone(&self.db);
            let transcoder = self
                .transcoder
                .clone()
                .filter(|_| item.body.chars().count() > self.min_body_length);
            let source_id = source.id;
            let source_link = source.link.clone();
            let source_title = source.title.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let repo = ContentRepository::new(db.pool());
                if repo.exists_by_fingerprint(&hash_id).await? {
                    return Ok(None);
                }

                let mut content = NewContent::new(source_id, &source_link, &item.origin_id, &item.title)
                    .with_link(&item.link)
                    .with_description(&item.body);

                if let Some(transcoder) = transcoder {
                    match transcoder
                        .publish(&source_title, &item.title, &item.link, &item.body)
                        .await
                    {
                        Ok(url) => content = content.with_telegraph_url(url),
                        Err(e) => warn!("Transcoding of {} failed: {}", item.link, e),
                    }
                }

                repo.create(&content).await
            });
        }

        let mut created = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(content))) => created.push(content),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => error!("Failed to store item for source {}: {}", source.id, e),
                Err(e) => error!("Item task for source {} aborted: {}", source.id, e),
            }
        }

        // Completion order is arbitrary; keep insertion order for delivery
        created.sort_by_key(|c| c.id);
        created
    }
}
