//! Content ledger types for feedrelay.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A deduplicated feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    /// Content ID.
    pub id: i64,
    /// Parent source.
    pub source_id: i64,
    /// Identifier provided by the origin (guid / atom id).
    pub raw_id: String,
    /// Fingerprint of source link + origin identifier.
    pub hash_id: String,
    /// Item title.
    pub title: String,
    /// Item body as published (may contain HTML).
    pub description: String,
    /// Canonical item link.
    pub raw_link: String,
    /// Transcoded article URL, if one was published.
    pub telegraph_url: Option<String>,
    /// When the item was ingested.
    pub created_at: DateTime<Utc>,
}

/// New content item for creation.
#[derive(Debug, Clone)]
pub struct NewContent {
    /// Parent source.
    pub source_id: i64,
    /// Origin identifier.
    pub raw_id: String,
    /// Fingerprint.
    pub hash_id: String,
    /// Item title.
    pub title: String,
    /// Item body.
    pub description: String,
    /// Canonical item link.
    pub raw_link: String,
    /// Transcoded article URL.
    pub telegraph_url: Option<String>,
}

impl NewContent {
    /// Create a new content item, computing its fingerprint from the source link.
    pub fn new(
        source_id: i64,
        source_link: &str,
        raw_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let raw_id = raw_id.into();
        Self {
            source_id,
            hash_id: fingerprint(source_link, &raw_id),
            raw_id,
            title: title.into().trim().to_string(),
            description: String::new(),
            raw_link: String::new(),
            telegraph_url: None,
        }
    }

    /// Set the body.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the canonical link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.raw_link = link.into();
        self
    }

    /// Set the transcoded article URL.
    pub fn with_telegraph_url(mut self, url: impl Into<String>) -> Self {
        self.telegraph_url = Some(url.into());
        self
    }
}

/// Deterministic dedup key for an item of a source.
///
/// Lowercase hex SHA-256 over the source link and the origin identifier,
/// separated by a NUL byte.
pub fn fingerprint(source_link: &str, raw_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_link.as_bytes());
    hasher.update([0u8]);
    hasher.update(raw_id.as_bytes());
    format!("{:x}", hasher.finalize())
}
