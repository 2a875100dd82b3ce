//! Subscription index: (subscriber, source) pairings and their settings.

pub mod repository;
pub mod types;

pub use repository::SubscriptionRepository;
pub use types::{format_tags, NewSubscription, Subscription, MAX_TAGS};
