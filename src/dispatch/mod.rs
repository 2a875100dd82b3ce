//! Dispatcher: renders new items per subscription and hands them to the
//! delivery transport.

pub mod render;
pub mod transport;

pub use render::{strip_html, Message};
pub use transport::{DeliveryTransport, LogTransport, WebhookTransport};

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error};

use crate::content::Content;
use crate::source::Source;
use crate::subscription::Subscription;

/// A delivery that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Subscriber the message was meant for.
    pub subscriber_id: i64,
    /// Content item of the message.
    pub content_id: i64,
    /// Transport error message.
    pub error: String,
}

/// Outcome of one dispatch batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Messages handed to the transport successfully.
    pub delivered: usize,
    /// Messages not sent because the subscription has notifications off.
    pub skipped: usize,
    /// Messages the transport rejected.
    pub failed: Vec<DeliveryFailure>,
}

/// Fans new items out to subscriptions.
pub struct Dispatcher {
    transport: Arc<dyn DeliveryTransport>,
    preview_length: usize,
    max_concurrent: usize,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(
        transport: Arc<dyn DeliveryTransport>,
        preview_length: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            transport,
            preview_length,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Deliver every item to every subscription of the source.
    ///
    /// Each subscriber receives its messages in item order; subscribers are
    /// served concurrently. A failed delivery never blocks other deliveries.
    pub async fn dispatch(
        &self,
        source: &Source,
        items: &[Content],
        subscriptions: &[Subscription],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        if items.is_empty() {
            return report;
        }

        let mut batches = Vec::new();
        for sub in subscriptions {
            if !sub.enable_notification {
                report.skipped += items.len();
                continue;
            }
            let messages: Vec<(i64, Message)> = items
                .iter()
                .map(|item| {
                    (
                        item.id,
                        Message::render(source, item, sub, self.preview_length),
                    )
                })
                .collect();
            batches.push((sub.subscriber_id, messages));
        }

        let transport = &self.transport;
        let mut results = stream::iter(batches)
            .map(|(subscriber_id, messages)| async move {
                let mut outcomes = Vec::with_capacity(messages.len());
                for (content_id, message) in messages {
                    let result = transport.send(subscriber_id, &message).await;
                    outcomes.push((subscriber_id, content_id, result));
                }
                outcomes
            })
            .buffer_unordered(self.max_concurrent);

        while let Some(outcomes) = results.next().await {
            for (subscriber_id, content_id, result) in outcomes {
                match result {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        error!(
                            "Failed to deliver content {} to {}: {}",
                            content_id, subscriber_id, e
                        );
                        report.failed.push(DeliveryFailure {
                            subscriber_id,
                            content_id,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        debug!(
            "Source {} dispatch: {} delivered, {} skipped, {} failed",
            source.id,
            report.delivered,
            report.skipped,
            report.failed.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeedRelayError, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(i64, String)>>,
        reject: Option<i64>,
    }

    #[async_trait]
    impl DeliveryTransport for Recorder {
        async fn send(&self, subscriber_id: i64, message: &Message) -> Result<()> {
            if self.reject == Some(subscriber_id) {
                return Err(FeedRelayError::Delivery("blocked".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((subscriber_id, message.title.clone()));
            Ok(())
        }
    }

    fn source() -> Source {
        Source {
            id: 1,
            link: "https://example.com/feed".to_string(),
            title: "Example".to_string(),
            error_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: i64) -> Content {
        Content {
            id,
            source_id: 1,
            raw_id: format!("item-{}", id),
            hash_id: format!("hash-{}", id),
            title: format!("Item {}", id),
            description: String::new(),
            raw_link: format!("https://example.com/{}", id),
            telegraph_url: None,
            created_at: Utc::now(),
        }
    }

    fn sub(subscriber_id: i64, enable_notification: bool) -> Subscription {
        Subscription {
            id: subscriber_id,
            subscriber_id,
            source_id: 1,
            interval_minutes: 10,
            enable_notification,
            enable_telegraph: true,
            tag: String::new(),
            wait_time: 10,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_skips_disabled_notifications() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(recorder.clone(), 0, 4);

        let report = dispatcher
            .dispatch(&source(), &[item(1)], &[sub(100, true), sub(200, false)])
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.failed.is_empty());
        assert_eq!(
            *recorder.sent.lock().unwrap(),
            vec![(100, "Item 1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_collected() {
        let recorder = Arc::new(Recorder {
            reject: Some(200),
            ..Recorder::default()
        });
        let dispatcher = Dispatcher::new(recorder.clone(), 0, 1);

        let report = dispatcher
            .dispatch(
                &source(),
                &[item(1), item(2)],
                &[sub(100, true), sub(200, true), sub(300, true)],
            )
            .await;

        assert_eq!(report.delivered, 4);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed.iter().all(|f| f.subscriber_id == 200));
    }

    #[tokio::test]
    async fn test_items_arrive_in_order_per_subscriber() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(recorder.clone(), 0, 8);

        dispatcher
            .dispatch(&source(), &[item(1), item(2), item(3)], &[sub(100, true)])
            .await;

        let titles: Vec<String> = recorder
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        assert_eq!(titles, vec!["Item 1", "Item 2", "Item 3"]);
    }

    #[tokio::test]
    async fn test_no_items_no_deliveries() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(recorder.clone(), 0, 8);

        let report = dispatcher.dispatch(&source(), &[], &[sub(100, true)]).await;
        assert_eq!(report, DispatchReport::default());
        assert!(recorder.sent.lock().unwrap().is_empty());
    }
}
