//! Feed transport: fetch a link and parse it into ordered items.

pub mod fetcher;
pub mod types;

pub use fetcher::{parse_feed, validate_url, HttpFeedFetcher};
pub use types::{FeedItem, FeedTransport, ParsedFeed};
