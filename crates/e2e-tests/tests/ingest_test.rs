//! Ingestion flow: rate limiting, idempotent adds and relay events.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use e2e_tests::{article, TestHarness};
use taghub_ingest::{EventPublisher, HttpEventRelay, HttpRelayConfig, IngestError};
use taghub_types::{ArticleEventKind, IngestSettings};

fn limited_harness() -> TestHarness {
    TestHarness::with_settings(IngestSettings {
        min_post_interval_ms: 60_000,
        ..Default::default()
    })
}

#[test]
fn test_same_author_within_interval_is_rate_limited() {
    let harness = limited_harness();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    let mut first = article("1", "rust");
    first.author_email = "x@y.com".to_string();
    let mut second = article("2", "go");
    second.author_email = "X@Y.com".to_string();

    harness.coordinator.add_article(first, t0).unwrap();
    let result = harness
        .coordinator
        .add_article(second.clone(), t0 + TimeDelta::seconds(30));
    match result {
        Err(IngestError::RateLimited { retry_after_ms }) => assert_eq!(retry_after_ms, 30_000),
        other => panic!("Expected RateLimited, got {:?}", other),
    }
    assert_eq!(harness.stats().article_count, 1);
    assert_eq!(harness.tag_count("go"), None);

    harness
        .coordinator
        .add_article(second, t0 + TimeDelta::seconds(61))
        .unwrap();
    assert_eq!(harness.stats().article_count, 2);
}

#[test]
fn test_different_authors_are_independent() {
    let harness = limited_harness();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    harness.coordinator.add_article(article("1", "rust"), t0).unwrap();
    harness.coordinator.add_article(article("2", "rust"), t0).unwrap();
    assert_eq!(harness.tag_count("rust"), Some(2));
}

#[test]
fn test_readd_is_idempotent() {
    let harness = TestHarness::new();
    let first = harness
        .coordinator
        .add_article(article("1", "rust, go"), Utc::now())
        .unwrap();
    let again = harness
        .coordinator
        .add_article(article("1", "zig"), Utc::now())
        .unwrap();

    assert!(first.created);
    assert!(!again.created);
    assert_eq!(again.article_id, first.article_id);
    assert_eq!(harness.tag_count("rust"), Some(1));
    assert_eq!(harness.tag_count("zig"), None);
    assert_eq!(harness.publisher.events().len(), 1);
}

#[test]
fn test_events_follow_commits() {
    let harness = TestHarness::new();
    let added = harness
        .coordinator
        .add_article(article("1", "rust"), Utc::now())
        .unwrap();
    harness
        .coordinator
        .update_article(article("1", "go"), Utc::now())
        .unwrap();

    let mut quiet = article("2", "rust");
    quiet.post_to_community = false;
    harness.coordinator.add_article(quiet, Utc::now()).unwrap();

    harness.coordinator.remove_article(&added.article_id).unwrap();

    let kinds: Vec<ArticleEventKind> = harness.publisher.events().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![ArticleEventKind::ArticleAdded, ArticleEventKind::ArticleUpdated]
    );
    let updated = &harness.publisher.events()[1].article;
    assert_eq!(updated.id, added.article_id);
    assert_eq!(updated.tag_titles, vec!["go"]);
}

#[test]
fn test_markup_in_titles_is_sanitized() {
    let harness = TestHarness::new();
    let mut input = article("1", "web");
    input.title = "<b>Bold</b> & co".to_string();
    let outcome = harness.coordinator.add_article(input, Utc::now()).unwrap();

    let stored = harness
        .coordinator
        .articles()
        .get(&outcome.article_id)
        .unwrap()
        .unwrap();
    assert!(!stored.title.contains('<'));
    assert!(stored.title.contains("Bold"));
}

#[tokio::test]
async fn test_http_relay_receives_added_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hub/events"))
        .and(body_partial_json(serde_json::json!({
            "key": "shared",
            "event": "article_added",
            "from": "Solo",
            "version": "1.0.0",
            "title": "Example Blog",
            "host": "blog.example.com",
            "article": { "original_id": "1001", "tag_titles": ["rust"] }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, handle) = HttpEventRelay::spawn(HttpRelayConfig {
        endpoint: format!("{}/hub/events", server.uri()),
        shared_secret: SecretString::from("shared".to_string()),
        queue_capacity: 16,
        timeout: Duration::from_secs(2),
    })
    .unwrap();
    let stats = relay.stats();

    let harness = TestHarness::new();
    let publisher: Arc<dyn EventPublisher> = Arc::new(relay);
    let coordinator = harness.coordinator_with(publisher);
    coordinator
        .add_article(article("1001", "rust"), Utc::now())
        .unwrap();

    // Dropping the coordinator drops the last relay handle; the sender drains and exits
    drop(coordinator);
    handle.await.unwrap();

    assert_eq!(stats.delivered.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_relay_failure_does_not_fail_ingestion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (relay, handle) = HttpEventRelay::spawn(HttpRelayConfig {
        endpoint: server.uri(),
        shared_secret: SecretString::from("shared".to_string()),
        queue_capacity: 16,
        timeout: Duration::from_secs(2),
    })
    .unwrap();
    let stats = relay.stats();

    let harness = TestHarness::new();
    let coordinator = harness.coordinator_with(Arc::new(relay));
    let outcome = coordinator.add_article(article("1", "rust"), Utc::now());
    assert!(outcome.is_ok());

    drop(coordinator);
    handle.await.unwrap();
    assert_eq!(stats.failed.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(harness.stats().article_count, 1);
}
