//! HTTP feed transport.
//!
//! Fetches RSS/Atom/JSON feeds over HTTP(S) with configured timeouts,
//! redirect limits, proxy and size limits, and parses them with feed-rs.

use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use super::types::{FeedItem, FeedTransport, ParsedFeed};
use crate::config::FetchConfig;
use crate::{FeedRelayError, Result};

/// Feed transport backed by reqwest.
pub struct HttpFeedFetcher {
    client: Client,
    max_feed_size: u64,
}

impl HttpFeedFetcher {
    /// Create a new fetcher from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str());

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| FeedRelayError::Config(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FeedRelayError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }
}

#[async_trait]
impl FeedTransport for HttpFeedFetcher {
    async fn fetch(&self, link: &str) -> Result<ParsedFeed> {
        validate_url(link).map_err(|e| FeedRelayError::Fetch(e.to_string()))?;

        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| FeedRelayError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FeedRelayError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(FeedRelayError::Fetch(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedRelayError::Fetch(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(FeedRelayError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        let feed = parse_feed(&bytes)?;
        debug!(link, items = feed.items.len(), "Fetched feed");
        Ok(feed)
    }
}

/// Validate that a link is an absolute http(s) URL with a host.
pub fn validate_url(link: &str) -> Result<()> {
    let parsed = url::Url::parse(link)
        .map_err(|e| FeedRelayError::Validation(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedRelayError::Validation(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FeedRelayError::Validation("URL has no host".to_string()));
    }

    Ok(())
}

/// Parse feed bytes into a ParsedFeed.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedRelayError::Fetch(format!("failed to parse feed: {}", e)))?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let item_title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_default();
            // Entries without an id are keyed by their link, then their title
            let origin_id = [entry.id.as_str(), link.as_str(), item_title.as_str()]
                .into_iter()
                .find(|s| !s.trim().is_empty())
                .unwrap_or_default()
                .to_string();
            let body = entry
                .content
                .and_then(|c| c.body)
                .filter(|b| !b.trim().is_empty())
                .or(entry.summary.map(|s| s.content))
                .unwrap_or_default();

            FeedItem {
                origin_id,
                title: item_title,
                link,
                body,
            }
        })
        .collect();

    Ok(ParsedFeed { title, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title> Example Feed </title>
    <link>https://example.com</link>
    <description>Example</description>
    <item>
      <title>First post</title>
      <link>https://example.com/posts/1</link>
      <guid>post-1</guid>
      <description>Short summary</description>
      <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
    </item>
    <item>
      <title>Second post</title>
      <link>https://example.com/posts/2</link>
      <guid>post-2</guid>
      <description>Only a summary</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://example.com/feed.xml").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        let result = validate_url("ftp://example.com/feed.xml");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported URL scheme"));
    }

    #[test]
    fn test_validate_url_rejects_garbage() {
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_parse_rss() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(feed.title, "Example Feed");
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.origin_id, "post-1");
        assert_eq!(first.title, "First post");
        assert_eq!(first.link, "https://example.com/posts/1");
        assert_eq!(first.body, "<p>Full body</p>");

        let second = &feed.items[1];
        assert_eq!(second.origin_id, "post-2");
        assert_eq!(second.body, "Only a summary");
    }

    #[test]
    fn test_parse_invalid_is_fetch_error() {
        let result = parse_feed(b"this is not a feed");
        assert!(result.unwrap_err().is_fetch());
    }

    #[test]
    fn test_new_fetcher_with_proxy() {
        let config = FetchConfig {
            proxy: Some("http://127.0.0.1:8080".to_string()),
            ..FetchConfig::default()
        };
        assert!(HttpFeedFetcher::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_link_as_fetch_error() {
        let fetcher = HttpFeedFetcher::new(&FetchConfig::default()).unwrap();
        let result = fetcher.fetch("file:///etc/passwd").await;
        assert!(result.unwrap_err().is_fetch());
    }
}
