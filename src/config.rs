//! Configuration module for feedrelay.

use serde::Deserialize;
use std::path::Path;

use crate::{FeedRelayError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedrelay.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed fetch transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Optional proxy URL (e.g. `socks5://127.0.0.1:1080`).
    #[serde(default)]
    pub proxy: Option<String>,
    /// Maximum number of items of one feed stored (and transcoded) at once.
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_concurrent_items() -> usize {
    8
}

fn default_user_agent() -> String {
    "feedrelay/0.1 (+feed reader)".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
            proxy: None,
            max_concurrent_items: default_max_concurrent_items(),
        }
    }
}

/// Scheduler and circuit breaker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Tick resolution in seconds. Must be a whole number of minutes, since
    /// subscription intervals are counted in minutes.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Default poll interval for new subscriptions, in minutes.
    #[serde(default = "default_interval_minutes")]
    pub default_interval_minutes: i64,
    /// Consecutive fetch failures before a source stops being polled.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: i64,
}

fn default_tick_secs() -> u64 {
    60
}

fn default_interval_minutes() -> i64 {
    10
}

fn default_error_threshold() -> i64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            default_interval_minutes: default_interval_minutes(),
            error_threshold: default_error_threshold(),
        }
    }
}

/// Telegraph transcoding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegraphConfig {
    /// Whether long items are published to Telegraph.
    #[serde(default)]
    pub enabled: bool,
    /// Minimum body length (in characters) that triggers transcoding.
    #[serde(default = "default_min_body_length")]
    pub min_body_length: usize,
    /// Access tokens, used in rotation.
    #[serde(default)]
    pub access_tokens: Vec<String>,
    /// Author name shown on published pages.
    #[serde(default = "default_author_name")]
    pub author_name: String,
    /// Author URL shown on published pages.
    #[serde(default)]
    pub author_url: String,
    /// Telegraph API base URL.
    #[serde(default = "default_telegraph_api_url")]
    pub api_url: String,
}

fn default_min_body_length() -> usize {
    0
}

fn default_author_name() -> String {
    "feedrelay".to_string()
}

fn default_telegraph_api_url() -> String {
    "https://api.telegra.ph".to_string()
}

impl Default for TelegraphConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_body_length: default_min_body_length(),
            access_tokens: Vec::new(),
            author_name: default_author_name(),
            author_url: String::new(),
            api_url: default_telegraph_api_url(),
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Maximum preview excerpt length in characters (0 disables the preview).
    #[serde(default)]
    pub preview_length: usize,
    /// Maximum number of deliveries in flight for one batch.
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,
    /// Webhook URL for the webhook delivery transport. Messages are only logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_max_concurrent_deliveries() -> usize {
    8
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            preview_length: 0,
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            webhook_url: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Telegraph configuration.
    #[serde(default)]
    pub telegraph: TelegraphConfig,
    /// Dispatch configuration.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedRelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedRelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDRELAY_WEBHOOK_URL`: delivery webhook URL
    /// - `FEEDRELAY_TELEGRAPH_TOKEN`: comma-separated Telegraph access tokens
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FEEDRELAY_WEBHOOK_URL") {
            if !url.is_empty() {
                self.dispatch.webhook_url = Some(url);
            }
        }
        if let Ok(tokens) = std::env::var("FEEDRELAY_TELEGRAPH_TOKEN") {
            let tokens: Vec<String> = tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            if !tokens.is_empty() {
                self.telegraph.access_tokens = tokens;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_secs == 0 || self.scheduler.tick_secs % 60 != 0 {
            return Err(FeedRelayError::Config(
                "scheduler.tick_secs must be a positive multiple of 60".to_string(),
            ));
        }
        if self.fetch.max_concurrent_items == 0 {
            return Err(FeedRelayError::Config(
                "fetch.max_concurrent_items must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.default_interval_minutes <= 0 {
            return Err(FeedRelayError::Config(
                "scheduler.default_interval_minutes must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.error_threshold <= 0 {
            return Err(FeedRelayError::Config(
                "scheduler.error_threshold must be greater than 0".to_string(),
            ));
        }
        if self.dispatch.max_concurrent_deliveries == 0 {
            return Err(FeedRelayError::Config(
                "dispatch.max_concurrent_deliveries must be greater than 0".to_string(),
            ));
        }
        if self.telegraph.enabled && self.telegraph.access_tokens.is_empty() {
            return Err(FeedRelayError::Config(
                "telegraph is enabled but no access token is set. \
                 Set telegraph.access_tokens or FEEDRELAY_TELEGRAPH_TOKEN."
                    .to_string(),
            ));
        }
        Ok(())
    }
}
