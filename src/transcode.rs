//! Long-form transcoding to Telegraph.
//!
//! Long items are published as Telegraph pages so subscribers get a
//! read-friendly link next to the original one. Transcoding is best-effort:
//! callers treat every error as non-fatal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::TelegraphConfig;
use crate::dispatch::render::{strip_html, truncate_chars};
use crate::{FeedRelayError, Result};

/// Maximum Telegraph page title length.
const MAX_TITLE_LENGTH: usize = 256;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Publishes item text to a read-friendly host and returns its URL.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Publish an item, returning the URL of the published article.
    async fn publish(
        &self,
        source_title: &str,
        item_title: &str,
        item_link: &str,
        item_body: &str,
    ) -> Result<String>;
}

/// Transcoder backed by the Telegraph `createPage` API.
pub struct TelegraphPublisher {
    client: Client,
    api_url: String,
    access_tokens: Vec<String>,
    next_token: AtomicUsize,
    author_name: String,
    author_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<PageResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageResult {
    url: String,
}

impl TelegraphPublisher {
    /// Create a publisher from the telegraph configuration.
    pub fn new(config: &TelegraphConfig) -> Result<Self> {
        let access_tokens: Vec<String> = config
            .access_tokens
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if access_tokens.is_empty() {
            return Err(FeedRelayError::Config(
                "telegraph requires at least one access token".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FeedRelayError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_tokens,
            next_token: AtomicUsize::new(0),
            author_name: config.author_name.clone(),
            author_url: config.author_url.clone(),
        })
    }

    /// Pick the next access token in rotation.
    fn token(&self) -> &str {
        let idx = self.next_token.fetch_add(1, Ordering::Relaxed) % self.access_tokens.len();
        &self.access_tokens[idx]
    }
}

#[async_trait]
impl Transcoder for TelegraphPublisher {
    async fn publish(
        &self,
        source_title: &str,
        item_title: &str,
        item_link: &str,
        item_body: &str,
    ) -> Result<String> {
        let title = if item_title.trim().is_empty() {
            source_title
        } else {
            item_title
        };

        let body = json!({
            "access_token": self.token(),
            "title": truncate_chars(title.trim(), MAX_TITLE_LENGTH),
            "author_name": self.author_name,
            "author_url": self.author_url,
            "content": build_nodes(source_title, item_link, item_body),
            "return_content": false,
        });

        let response: ApiResponse = self
            .client
            .post(format!("{}/createPage", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| FeedRelayError::Transcode(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| FeedRelayError::Transcode(e.to_string()))?
            .json()
            .await
            .map_err(|e| FeedRelayError::Transcode(format!("invalid response: {}", e)))?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(page),
                ..
            } => Ok(page.url),
            ApiResponse { error, .. } => Err(FeedRelayError::Transcode(
                error.unwrap_or_else(|| "createPage failed".to_string()),
            )),
        }
    }
}

/// Build the Telegraph node list for an item: one paragraph per text block,
/// followed by a link back to the original.
pub fn build_nodes(source_title: &str, item_link: &str, item_body: &str) -> Vec<Value> {
    let mut nodes: Vec<Value> = split_blocks(item_body)
        .into_iter()
        .map(|text| json!({ "tag": "p", "children": [text] }))
        .collect();

    if !item_link.is_empty() {
        let label = if source_title.is_empty() {
            item_link
        } else {
            source_title
        };
        nodes.push(json!({
            "tag": "p",
            "children": [
                "Original: ",
                { "tag": "a", "attrs": { "href": item_link }, "children": [label] }
            ]
        }));
    }

    nodes
}

/// Split an HTML body into plain-text blocks at paragraph and line breaks.
fn split_blocks(html: &str) -> Vec<String> {
    const BREAKS: [&str; 7] = ["</p>", "</P>", "<br>", "<br/>", "<br />", "</div>", "</li>"];

    let mut marked = html.to_string();
    for tag in BREAKS {
        marked = marked.replace(tag, "\u{0}");
    }

    marked
        .split(|c| c == '\u{0}' || c == '\n')
        .map(strip_html)
        .filter(|block| !block.is_empty())
        .collect()
}
