//! feedrelay - feed polling, deduplication and dispatch engine
//!
//! Polls many web feeds on individual schedules, stores every new item once
//! and fans it out to subscribers according to their settings. Chronically
//! failing feeds are disabled by a per-source circuit breaker.

pub mod config;
pub mod content;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod subscription;
pub mod transcode;

pub use config::Config;
pub use content::{fingerprint, Content, ContentRepository, NewContent};
pub use db::{Database, DbPool};
pub use dispatch::{
    DeliveryFailure, DeliveryTransport, DispatchReport, Dispatcher, LogTransport, Message,
    WebhookTransport,
};
pub use error::{FeedRelayError, Result};
pub use feed::{FeedItem, FeedTransport, HttpFeedFetcher, ParsedFeed};
pub use pipeline::Pipeline;
pub use scheduler::{CycleOutcome, Scheduler, TickReport};
pub use service::{FeedService, SubscriptionSettings};
pub use source::{BreakerState, CircuitBreaker, NewSource, Source, SourceRepository};
pub use subscription::{NewSubscription, Subscription, SubscriptionRepository};
pub use transcode::{TelegraphPublisher, Transcoder};
