//! End-to-end tests for the polling, dedup and dispatch engine.

mod common;

use std::sync::Arc;

use common::{item, FailingTranscoder, Harness};
use feedrelay::{
    fingerprint, BreakerState, ContentRepository, CycleOutcome, SourceRepository,
};

const LINK: &str = "https://example.com/feed";

async fn error_count(h: &Harness, source_id: i64) -> i64 {
    SourceRepository::new(h.db.pool())
        .get_by_id(source_id)
        .await
        .unwrap()
        .unwrap()
        .error_count
}

#[tokio::test]
async fn test_same_item_is_ingested_once() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, vec![item("1")]);
    let (source, _) = h.service().subscribe_link(100, LINK).await.unwrap();

    // Initial ingestion stored the item; a later fetch of the same document adds nothing
    let again = h.pipeline.run(&source).await.unwrap();
    assert!(again.is_empty());
    let again = h.pipeline.ingest(&source, vec![item("1")]).await;
    assert!(again.is_empty());

    let contents = ContentRepository::new(h.db.pool());
    assert_eq!(contents.count_by_source(source.id).await.unwrap(), 1);
    assert!(contents
        .exists_by_fingerprint(&fingerprint(LINK, "1"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_initial_ingestion_is_not_dispatched() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, vec![item("1"), item("2")]);
    h.service().subscribe_link(100, LINK).await.unwrap();

    let outcomes = h.tick().await.join().await;
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        outcomes[0],
        CycleOutcome::Fetched { new_items: 0, .. }
    ));
    assert!(h.delivery.sent().is_empty());
}

#[tokio::test]
async fn test_failing_source_is_disabled_until_resumed() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, vec![item("1")]);
    let (source, _) = h.service().subscribe_link(100, LINK).await.unwrap();
    assert_eq!(h.feeds.fetch_count(LINK), 1);

    h.feeds.set_failing(LINK, true);
    for _ in 0..3 {
        let outcomes = h.tick().await.join().await;
        assert!(matches!(outcomes[0], CycleOutcome::Failed { .. }));
    }
    assert_eq!(error_count(&h, source.id).await, 3);
    assert_eq!(h.feeds.fetch_count(LINK), 4);

    // Fourth due tick skips the source
    let report = h.tick().await;
    assert!(report.launched.is_empty());
    assert_eq!(report.disabled, vec![source.id]);
    assert_eq!(h.feeds.fetch_count(LINK), 4);

    let settings = h.service().subscription_settings(100, source.id).await.unwrap();
    assert_eq!(settings.state, BreakerState::DisabledByError);

    assert_eq!(
        h.service().resume_source(source.id).await.unwrap(),
        BreakerState::Active { failures: 0 }
    );
    assert_eq!(error_count(&h, source.id).await, 0);

    h.feeds.set_failing(LINK, false);
    h.feeds.push_item(LINK, item("2"));
    let outcomes = h.tick().await.join().await;
    assert!(matches!(
        outcomes[0],
        CycleOutcome::Fetched { new_items: 1, .. }
    ));
    assert_eq!(h.feeds.fetch_count(LINK), 5);
}

#[tokio::test]
async fn test_pause_resume_toggle_values() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, vec![item("1")]);
    let (source, _) = h.service().subscribe_link(100, LINK).await.unwrap();
    let service = h.service();

    h.feeds.set_failing(LINK, true);
    h.tick().await.join().await;
    assert_eq!(error_count(&h, source.id).await, 1);

    service.pause_source(source.id).await.unwrap();
    assert_eq!(error_count(&h, source.id).await, 4);
    service.pause_source(source.id).await.unwrap();
    assert_eq!(error_count(&h, source.id).await, 4);

    // Paused sources are not polled
    let report = h.tick().await;
    assert_eq!(report.disabled, vec![source.id]);

    service.resume_source(source.id).await.unwrap();
    assert_eq!(error_count(&h, source.id).await, 0);

    service.toggle_source(source.id).await.unwrap();
    assert_eq!(error_count(&h, source.id).await, 4);
    service.toggle_source(source.id).await.unwrap();
    assert_eq!(error_count(&h, source.id).await, 0);
}

#[tokio::test]
async fn test_shared_source_is_fetched_once_per_cycle() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, vec![item("1")]);
    let service = h.service();
    let (source, _) = service.subscribe_link(100, LINK).await.unwrap();
    service.subscribe(200, source.id).await.unwrap();
    service.subscribe(300, source.id).await.unwrap();

    h.feeds.push_item(LINK, item("2"));
    let report = h.tick().await;
    assert_eq!(report.launched.len(), 1);
    report.join().await;

    assert_eq!(h.feeds.fetch_count(LINK), 2);
    assert_eq!(h.delivery.recipients(), vec![100, 200, 300]);
    assert_eq!(h.delivery.sent().len(), 3);

    // A failing cycle is reported to the breaker exactly once
    h.feeds.set_failing(LINK, true);
    h.tick().await.join().await;
    assert_eq!(error_count(&h, source.id).await, 1);
}

#[tokio::test]
async fn test_notifications_off_receive_nothing() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, vec![item("1")]);
    let service = h.service();
    let (source, _) = service.subscribe_link(100, LINK).await.unwrap();
    service.subscribe(200, source.id).await.unwrap();
    service.toggle_notification(200, source.id).await.unwrap();

    h.feeds.push_item(LINK, item("2"));
    h.tick().await.join().await;

    let sent = h.delivery.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 100);
    assert_eq!(sent[0].1.title, "Item 2");
}

#[tokio::test]
async fn test_failed_transcoding_links_canonical_item() {
    let h = Harness::with_transcoder(3, Arc::new(FailingTranscoder)).await;
    h.feeds.set_items(LINK, Vec::new());
    let (source, sub) = h.service().subscribe_link(100, LINK).await.unwrap();
    assert!(sub.enable_telegraph);

    h.feeds.push_item(LINK, item("1"));
    h.tick().await.join().await;

    let sent = h.delivery.sent();
    assert_eq!(sent.len(), 1);
    let message = &sent[0].1;
    assert_eq!(message.primary_link, "https://example.com/posts/1");
    assert!(message.transcoded_link.is_none());
    assert_eq!(message.source_title, source.title);
}

#[tokio::test]
async fn test_tags_are_rendered() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, Vec::new());
    let service = h.service();
    let (source, _) = service.subscribe_link(100, LINK).await.unwrap();
    service
        .set_tags(100, source.id, &["rust", "news"])
        .await
        .unwrap();

    h.feeds.push_item(LINK, item("1"));
    h.tick().await.join().await;

    let sent = h.delivery.sent();
    assert_eq!(sent[0].1.tags.as_deref(), Some("#rust #news"));
}

#[tokio::test]
async fn test_last_unsubscribe_removes_source_and_content() {
    let h = Harness::new(3).await;
    h.feeds.set_items(LINK, vec![item("1"), item("2")]);
    let service = h.service();
    let (source, _) = service.subscribe_link(100, LINK).await.unwrap();

    service.unsubscribe(100, source.id).await.unwrap();

    assert!(SourceRepository::new(h.db.pool())
        .get_by_link(LINK)
        .await
        .unwrap()
        .is_none());
    let contents = ContentRepository::new(h.db.pool());
    for id in ["1", "2"] {
        assert!(!contents
            .exists_by_fingerprint(&fingerprint(LINK, id))
            .await
            .unwrap());
    }

    // Nothing is polled any more
    let report = h.tick().await;
    assert!(report.launched.is_empty());
}
