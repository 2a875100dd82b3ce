//! Delivery transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use super::render::Message;
use crate::{FeedRelayError, Result};

/// Webhook request timeout in seconds.
const WEBHOOK_TIMEOUT_SECS: u64 = 15;

/// Hands a rendered message to a subscriber.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Deliver `message` to `subscriber_id`.
    async fn send(&self, subscriber_id: i64, message: &Message) -> Result<()>;
}

/// Transport that only logs messages.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl DeliveryTransport for LogTransport {
    async fn send(&self, subscriber_id: i64, message: &Message) -> Result<()> {
        info!(subscriber_id, "{}", message.to_plain_text());
        Ok(())
    }
}

/// Transport that POSTs each message as JSON to a webhook.
pub struct WebhookTransport {
    url: String,
    client: Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subscriber_id: i64,
    message: &'a Message,
    text: String,
}

impl WebhookTransport {
    /// Create a webhook transport for `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        crate::feed::validate_url(&url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| FeedRelayError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl DeliveryTransport for WebhookTransport {
    async fn send(&self, subscriber_id: i64, message: &Message) -> Result<()> {
        let payload = WebhookPayload {
            subscriber_id,
            message,
            text: message.to_plain_text(),
        };

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FeedRelayError::Delivery(format!("webhook post: {}", e)))?
            .error_for_status()
            .map_err(|e| FeedRelayError::Delivery(format!("webhook non-2xx: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message {
            source_title: "Example".to_string(),
            title: "Hello".to_string(),
            preview: None,
            primary_link: "https://example.com/1".to_string(),
            transcoded_link: None,
            tags: Some("#rust".to_string()),
        }
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        assert!(LogTransport.send(1, &message()).await.is_ok());
    }

    #[test]
    fn test_webhook_requires_valid_url() {
        assert!(WebhookTransport::new("not a url").is_err());
        assert!(WebhookTransport::new("https://hooks.example.com/feed").is_ok());
    }

    #[test]
    fn test_webhook_payload_shape() {
        let msg = message();
        let payload = WebhookPayload {
            subscriber_id: 42,
            message: &msg,
            text: msg.to_plain_text(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["subscriber_id"], 42);
        assert_eq!(value["message"]["primary_link"], "https://example.com/1");
        assert_eq!(value["message"]["tags"], "#rust");
        assert_eq!(value["text"], "Example\nHello: https://example.com/1\n#rust");
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_delivery_error() {
        let transport = WebhookTransport::new("http://127.0.0.1:9/hook").unwrap();
        let err = transport.send(1, &message()).await.unwrap_err();
        assert!(matches!(err, FeedRelayError::Delivery(_)));
    }
}
