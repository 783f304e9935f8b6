//! End-to-end test infrastructure for taghub.
//!
//! Provides a shared `TestHarness` wiring real storage, the ingestion
//! coordinator and the query side, plus helpers for building inputs and
//! checking index consistency.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use taghub_ingest::{
    ArticleInput, ArticleQuery, EscapeSanitizer, EventPublisher, IngestionCoordinator,
    RateLimiter,
};
use taghub_prober::{AccessibilityProber, Probe, ProberConfig};
use taghub_storage::{Storage, StorageStats};
use taghub_types::{ArticleEvent, IngestSettings};

/// Publisher that keeps every event for inspection.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ArticleEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<ArticleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: ArticleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Probe that always answers with one status.
pub struct FixedStatusProbe(pub u16);

#[async_trait]
impl Probe for FixedStatusProbe {
    async fn status_of(&self, _url: &str) -> Result<u16, String> {
        Ok(self.0)
    }
}

/// Shared harness for E2E tests.
pub struct TestHarness {
    /// Keeps the database directory alive
    pub _temp_dir: TempDir,
    pub storage: Arc<Storage>,
    pub limiter: Arc<RateLimiter>,
    pub publisher: Arc<RecordingPublisher>,
    pub coordinator: Arc<IngestionCoordinator>,
}

impl TestHarness {
    /// Harness with default rules and no rate limit.
    pub fn new() -> Self {
        Self::with_settings(IngestSettings {
            min_post_interval_ms: 0,
            ..Default::default()
        })
    }

    pub fn with_settings(settings: IngestSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));
        let publisher = Arc::new(RecordingPublisher::default());
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
            settings.min_post_interval_ms,
        )));
        let coordinator = Arc::new(IngestionCoordinator::new(
            storage.clone(),
            limiter.clone(),
            Arc::new(EscapeSanitizer),
            publisher.clone(),
            settings,
        ));
        Self {
            _temp_dir: temp_dir,
            storage,
            limiter,
            publisher,
            coordinator,
        }
    }

    /// A second coordinator over the same storage, publishing to `publisher`.
    pub fn coordinator_with(&self, publisher: Arc<dyn EventPublisher>) -> IngestionCoordinator {
        IngestionCoordinator::new(
            self.storage.clone(),
            self.limiter.clone(),
            Arc::new(EscapeSanitizer),
            publisher,
            IngestSettings {
                min_post_interval_ms: 0,
                ..Default::default()
            },
        )
    }

    pub fn query(&self) -> ArticleQuery {
        ArticleQuery::from_coordinator(&self.coordinator)
    }

    pub fn prober(&self, probe: Arc<dyn Probe>, failure_threshold: u32) -> AccessibilityProber {
        let config = ProberConfig {
            batch_size: 1000,
            pool_size: 4,
            queue_capacity: 1000,
            timeout: Duration::from_secs(5),
            failure_threshold,
        };
        AccessibilityProber::new(self.coordinator.clone(), probe, config)
            .expect("Failed to build prober")
    }

    /// Reference count of a tag, `None` if the tag was never created.
    pub fn tag_count(&self, title: &str) -> Option<u64> {
        self.coordinator
            .tags()
            .get_by_title(title)
            .expect("Failed to read tag")
            .map(|t| t.reference_count)
    }

    pub fn stats(&self) -> StorageStats {
        self.storage.get_stats().expect("Failed to read stats")
    }

    /// Panics unless every tag's count equals its live relation count.
    pub fn assert_counts_match_relations(&self) {
        let tags = self.coordinator.tags().all().expect("Failed to list tags");
        for tag in tags {
            let live = self
                .coordinator
                .relations()
                .count_for_tag(tag.id)
                .expect("Failed to count relations");
            assert_eq!(
                tag.reference_count, live,
                "tag '{}' count {} != live relations {}",
                tag.title, tag.reference_count, live
            );
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Input for a valid article; each original id gets its own author.
pub fn article(original_id: &str, tags: &str) -> ArticleInput {
    ArticleInput {
        original_id: original_id.to_string(),
        title: format!("Post {}", original_id),
        permalink: format!("/articles/{}", original_id),
        tags: tags.to_string(),
        author_email: format!("author{}@example.com", original_id),
        source_host: "blog.example.com".to_string(),
        source_title: "Example Blog".to_string(),
        source_version: "1.0.0".to_string(),
        source_name: "Solo".to_string(),
        post_to_community: true,
    }
}
