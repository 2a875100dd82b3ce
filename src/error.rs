//! Error types for feedrelay.

use thiserror::Error;

/// Common error type for feedrelay.
#[derive(Error, Debug)]
pub enum FeedRelayError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Transient fetch or parse failure of a feed document.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Transcoding collaborator failure.
    #[error("transcode error: {0}")]
    Transcode(String),

    /// Delivery transport failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The subscriber already has a subscription for the source.
    #[error("already subscribed to source {0}")]
    AlreadySubscribed(i64),
}

impl From<sqlx::Error> for FeedRelayError {
    fn from(e: sqlx::Error) -> Self {
        FeedRelayError::Database(e.to_string())
    }
}

impl FeedRelayError {
    /// Whether this error is a transient fetch failure that the circuit breaker counts.
    pub fn is_fetch(&self) -> bool {
        matches!(self, FeedRelayError::Fetch(_))
    }
}

/// Result type alias for feedrelay operations.
pub type Result<T> = std::result::Result<T, FeedRelayError>;
