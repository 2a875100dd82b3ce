//! Source types for feedrelay.

use chrono::{DateTime, Utc};

/// A feed origin, unique by its canonical link.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Source ID.
    pub id: i64,
    /// Canonical feed link.
    pub link: String,
    /// Feed title.
    pub title: String,
    /// Consecutive fetch failures. Only the circuit breaker writes this.
    pub error_count: i64,
    /// When the source was created.
    pub created_at: DateTime<Utc>,
    /// When the source was last updated.
    pub updated_at: DateTime<Utc>,
}

/// New source for creation.
#[derive(Debug, Clone)]
pub struct NewSource {
    /// Canonical feed link.
    pub link: String,
    /// Feed title.
    pub title: String,
    /// Initial failure counter.
    pub error_count: i64,
}

impl NewSource {
    /// Create a new source with a zero failure counter.
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: title.into(),
            error_count: 0,
        }
    }

    /// Set the initial failure counter.
    pub fn with_error_count(mut self, error_count: i64) -> Self {
        self.error_count = error_count;
        self
    }
}
