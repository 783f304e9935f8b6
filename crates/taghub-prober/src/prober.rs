//! Accessibility prober and unreachable-article sweep.
//!
//! A run samples a batch of stored articles and probes their permalinks on
//! a fixed pool of workers. Every probe bumps the article's check count;
//! failures, timeouts and rejected tasks also bump its failure count. The
//! sweep removes articles whose failure count passed the threshold.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};

use taghub_ingest::{IngestError, IngestionCoordinator};
use taghub_storage::{ArticleStore, Comparison};
use taghub_types::{Article, ProbeSettings};

use crate::error::ProbeError;
use crate::pool::probe_all;
use crate::probe::Probe;
use crate::state::{FailureReason, ProbeOutcome, ProbeState};

/// Prober tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProberConfig {
    /// Articles sampled per run
    pub batch_size: usize,
    /// Concurrent probes
    pub pool_size: usize,
    /// Tasks that may wait for a worker; beyond this they fail fast
    pub queue_capacity: usize,
    /// Deadline for one probe once a worker picks it up
    pub timeout: Duration,
    /// The sweep removes articles with more failures than this
    pub failure_threshold: u32,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self::from(&ProbeSettings::default())
    }
}

impl From<&ProbeSettings> for ProberConfig {
    fn from(settings: &ProbeSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            pool_size: settings.pool_size,
            queue_capacity: settings.queue_capacity,
            timeout: Duration::from_millis(settings.timeout_ms),
            failure_threshold: settings.failure_threshold,
        }
    }
}

impl ProberConfig {
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.pool_size == 0 {
            return Err(ProbeError::Config("pool_size must be > 0".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ProbeError::Config("timeout must be > 0".to_string()));
        }
        Ok(())
    }

    /// Upper bound on a run's wall time: `ceil(batch / pool) * timeout`.
    pub fn worst_case_run(&self) -> Duration {
        let waves = self.batch_size.div_ceil(self.pool_size.max(1)) as u32;
        self.timeout * waves
    }
}

/// Summary of one probe run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeRunReport {
    pub sampled: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures caused by the per-task timeout (included in `failed`)
    pub timed_out: usize,
    /// Failures caused by a full pool (included in `failed`)
    pub rejected: usize,
    /// Outcomes that could not be written
    pub record_errors: usize,
    pub duration_ms: u64,
}

impl ProbeRunReport {
    fn count(&mut self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success(_) => self.succeeded += 1,
            ProbeOutcome::Failure(reason) => {
                self.failed += 1;
                match reason {
                    FailureReason::Timeout => self.timed_out += 1,
                    FailureReason::Rejected => self.rejected += 1,
                    _ => {}
                }
            }
        }
    }
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub candidates: usize,
    pub removed: Vec<String>,
}

/// Probes stored articles and evicts the unreachable ones.
pub struct AccessibilityProber {
    coordinator: Arc<IngestionCoordinator>,
    probe: Arc<dyn Probe>,
    config: ProberConfig,
}

impl AccessibilityProber {
    pub fn new(
        coordinator: Arc<IngestionCoordinator>,
        probe: Arc<dyn Probe>,
        config: ProberConfig,
    ) -> Result<Self, ProbeError> {
        config.validate()?;
        Ok(Self {
            coordinator,
            probe,
            config,
        })
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Probe one random batch. Must be called inside a Tokio runtime.
    ///
    /// Storage reads and counter writes run on the blocking pool.
    pub async fn run(&self) -> Result<ProbeRunReport, ProbeError> {
        let start = Instant::now();
        let articles = self.coordinator.articles().clone();
        let batch_size = self.config.batch_size;
        let sample =
            tokio::task::spawn_blocking(move || articles.get_random_sample(batch_size)).await??;

        let mut report = ProbeRunReport {
            sampled: sample.len(),
            ..Default::default()
        };
        info!(
            sampled = sample.len(),
            pool = self.config.pool_size,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Probe run started"
        );

        let targets = sample
            .into_iter()
            .map(|article| {
                let url = article.permalink.clone();
                (article, url)
            })
            .collect();
        let run = probe_all(&self.probe, &self.config, targets).await?;
        report.record_errors += run.lost;
        for (_, state) in &run.completed {
            if let Some(outcome) = state.outcome() {
                report.count(outcome);
            }
        }

        let articles = self.coordinator.articles().clone();
        report.record_errors += tokio::task::spawn_blocking(move || {
            run.completed
                .into_iter()
                .filter(|(article, state)| record(&articles, article, state.clone()).is_err())
                .count()
        })
        .await?;

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            sampled = report.sampled,
            succeeded = report.succeeded,
            failed = report.failed,
            timed_out = report.timed_out,
            rejected = report.rejected,
            duration_ms = report.duration_ms,
            "Probe run complete"
        );
        Ok(report)
    }

    /// Remove every article whose failure count exceeds the threshold.
    ///
    /// Safe to repeat: articles already gone are skipped. Runs on the
    /// blocking pool.
    pub async fn sweep(&self) -> Result<SweepReport, ProbeError> {
        let coordinator = self.coordinator.clone();
        let threshold = self.config.failure_threshold;
        tokio::task::spawn_blocking(move || sweep_blocking(&coordinator, threshold)).await?
    }
}

fn record(articles: &ArticleStore, article: &Article, state: ProbeState) -> Result<ProbeState, ProbeError> {
    let success = state.outcome().map(ProbeOutcome::is_success).unwrap_or(false);
    match articles.record_accessibility(&article.id, success) {
        Ok(_) => {
            debug!(article_id = %article.id, outcome = ?state.outcome(), "Probe recorded");
            state.record()
        }
        Err(e) => {
            error!(article_id = %article.id, error = %e, "Failed to record probe outcome");
            Err(e.into())
        }
    }
}

fn sweep_blocking(
    coordinator: &IngestionCoordinator,
    threshold: u32,
) -> Result<SweepReport, ProbeError> {
    let candidates = coordinator
        .articles()
        .query_by_accessibility_failure_count(Comparison::GreaterThan, threshold)?;

    let mut report = SweepReport {
        candidates: candidates.len(),
        ..Default::default()
    };
    for article in candidates {
        match coordinator.remove_article(&article.id) {
            Ok(_) => {
                info!(
                    article_id = %article.id,
                    permalink = %article.permalink,
                    failures = article.accessibility_failure_count,
                    "Removed unreachable article"
                );
                report.removed.push(article.id);
            }
            Err(IngestError::NotFound(_)) => {
                debug!(article_id = %article.id, "Article already removed");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        candidates = report.candidates,
        removed = report.removed.len(),
        threshold,
        "Sweep complete"
    );
    Ok(report)
}
