//! Feed transport types for feedrelay.

use async_trait::async_trait;

use crate::Result;

/// A parsed feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    /// Feed title.
    pub title: String,
    /// Items in document order.
    pub items: Vec<FeedItem>,
}

/// A single entry of a parsed feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    /// Stable identifier provided by the origin.
    pub origin_id: String,
    /// Item title.
    pub title: String,
    /// Canonical item link (may be empty).
    pub link: String,
    /// Item body (may contain HTML).
    pub body: String,
}

impl FeedItem {
    /// Create a new item.
    pub fn new(
        origin_id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            origin_id: origin_id.into(),
            title: title.into(),
            link: link.into(),
            body: String::new(),
        }
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Retrieves and parses the feed document behind a link.
///
/// Any failure to fetch or parse is reported as [`crate::FeedRelayError::Fetch`].
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Fetch the feed at `link`.
    async fn fetch(&self, link: &str) -> Result<ParsedFeed>;
}
