//! Fire-and-forget delivery of article events to a downstream hub.
//!
//! `publish` never blocks: events go into a bounded queue drained by one
//! background task. A full queue drops the event. Delivery failures are
//! logged and not retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taghub_types::{Article, ArticleEvent, RelaySettings};

use crate::error::RelayError;
use crate::normalize::bare_host;

/// Sink for committed article events.
pub trait EventPublisher: Send + Sync {
    /// Hand off an event. Must not block the caller.
    fn publish(&self, event: ArticleEvent);
}

/// Publisher used when no relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRelay;

impl EventPublisher for DisabledRelay {
    fn publish(&self, event: ArticleEvent) {
        debug!(kind = event.kind.as_str(), article_id = %event.article.id, "Relay disabled, event discarded");
    }
}

/// Configuration for [`HttpEventRelay`].
#[derive(Debug, Clone)]
pub struct HttpRelayConfig {
    pub endpoint: String,
    pub shared_secret: SecretString,
    pub queue_capacity: usize,
    pub timeout: Duration,
}

impl HttpRelayConfig {
    /// Build from settings. Returns `None` if the relay is disabled.
    pub fn from_settings(settings: &RelaySettings) -> Result<Option<Self>, RelayError> {
        if !settings.enabled {
            return Ok(None);
        }
        let endpoint = settings
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RelayError::Config("endpoint is required".to_string()))?;
        Ok(Some(Self {
            endpoint,
            shared_secret: SecretString::from(settings.shared_secret.clone().unwrap_or_default()),
            queue_capacity: settings.queue_capacity.max(1),
            timeout: Duration::from_millis(settings.timeout_ms),
        }))
    }
}

/// Body POSTed for each event.
#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    key: &'a str,
    event: &'a str,
    from: &'a str,
    version: &'a str,
    title: &'a str,
    host: String,
    article: &'a Article,
}

/// Counters for relay activity.
#[derive(Debug, Default)]
pub struct RelayStats {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

/// HTTP relay backed by a bounded queue and a single sender task.
pub struct HttpEventRelay {
    tx: mpsc::Sender<ArticleEvent>,
    stats: Arc<RelayStats>,
}

impl HttpEventRelay {
    /// Start the sender task. Must be called inside a Tokio runtime.
    ///
    /// The task ends once every `HttpEventRelay` handle is dropped and the
    /// queue has drained.
    pub fn spawn(config: HttpRelayConfig) -> Result<(Self, JoinHandle<()>), RelayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(crate::USER_AGENT)
            .build()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(RelayStats::default());
        let handle = tokio::spawn(run_sender(client, config, rx, stats.clone()));

        info!("Event relay started");
        Ok((Self { tx, stats }, handle))
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        self.stats.clone()
    }
}

impl EventPublisher for HttpEventRelay {
    fn publish(&self, event: ArticleEvent) {
        let article_id = event.article.id.clone();
        let kind = event.kind.as_str();
        match self.tx.try_send(event) {
            Ok(()) => debug!(kind, article_id = %article_id, "Event queued for relay"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind, article_id = %article_id, "Relay queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind, article_id = %article_id, "Relay stopped, event dropped");
            }
        }
    }
}

async fn run_sender(
    client: Client,
    config: HttpRelayConfig,
    mut rx: mpsc::Receiver<ArticleEvent>,
    stats: Arc<RelayStats>,
) {
    while let Some(event) = rx.recv().await {
        match send_event(&client, &config, &event).await {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(kind = event.kind.as_str(), article_id = %event.article.id, "Event relayed");
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = event.kind.as_str(),
                    article_id = %event.article.id,
                    error = %e,
                    "Event relay failed"
                );
            }
        }
    }
    debug!("Event relay sender finished");
}

async fn send_event(
    client: &Client,
    config: &HttpRelayConfig,
    event: &ArticleEvent,
) -> Result<(), RelayError> {
    let article = &event.article;
    let payload = RelayPayload {
        key: config.shared_secret.expose_secret(),
        event: event.kind.as_str(),
        from: &article.source_name,
        version: &article.source_version,
        title: &article.source_title,
        host: bare_host(&article.source_host),
        article,
    };

    let response = client.post(&config.endpoint).json(&payload).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RelayError::Status(status.as_u16()));
    }
    Ok(())
}
