//! Subscription types for feedrelay.

use chrono::{DateTime, Utc};

/// Maximum number of tags on one subscription.
pub const MAX_TAGS: usize = 3;

/// A (subscriber, source) pairing with its delivery settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Subscription ID.
    pub id: i64,
    /// Chat or channel identity of the subscriber.
    pub subscriber_id: i64,
    /// Subscribed source.
    pub source_id: i64,
    /// Poll interval in minutes (scheduler ticks).
    pub interval_minutes: i64,
    /// Whether new items are delivered at all.
    pub enable_notification: bool,
    /// Whether delivered messages link the transcoded article.
    pub enable_telegraph: bool,
    /// Tag label, e.g. `#rust #news`. Empty when unset.
    pub tag: String,
    /// Ticks left until this pairing is due.
    pub wait_time: i64,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// The tag label, if any.
    pub fn tag_label(&self) -> Option<&str> {
        let tag = self.tag.trim();
        if tag.is_empty() {
            None
        } else {
            Some(tag)
        }
    }
}

/// New subscription for creation.
///
/// Both flags start enabled and the wait counter starts at the interval.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    /// Subscriber identity.
    pub subscriber_id: i64,
    /// Source ID.
    pub source_id: i64,
    /// Poll interval in minutes.
    pub interval_minutes: i64,
}

impl NewSubscription {
    /// Create a new subscription request.
    pub fn new(subscriber_id: i64, source_id: i64, interval_minutes: i64) -> Self {
        Self {
            subscriber_id,
            source_id,
            interval_minutes,
        }
    }
}

/// Format tag tokens into a label: `["a", "b"]` becomes `#a #b`.
///
/// Blank tokens and leading `#` are dropped, and at most [`MAX_TAGS`] are kept.
pub fn format_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|t| t.as_ref().trim().trim_start_matches('#'))
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}
