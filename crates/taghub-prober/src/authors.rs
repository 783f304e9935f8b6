//! Author reachability checks.
//!
//! A run samples author records and requests each author's blog URL on the
//! same bounded pool as article runs. Anything other than a 200, including
//! errors and timeouts, removes the author record. Authors the pool could
//! not admit are left for a later run.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use taghub_storage::AuthorStore;
use taghub_types::AuthorRecord;

use crate::error::ProbeError;
use crate::pool::probe_all;
use crate::probe::Probe;
use crate::prober::ProberConfig;
use crate::state::{FailureReason, ProbeOutcome, ProbeState};

/// Summary of one author run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorProbeReport {
    pub sampled: usize,
    pub kept: usize,
    /// Emails of removed authors
    pub removed: Vec<String>,
    /// Not probed because the pool was full
    pub skipped: usize,
    pub record_errors: usize,
    pub duration_ms: u64,
}

/// Probes author blogs and drops authors whose blog is gone.
pub struct AuthorProber {
    authors: AuthorStore,
    probe: Arc<dyn Probe>,
    config: ProberConfig,
}

impl AuthorProber {
    pub fn new(
        authors: AuthorStore,
        probe: Arc<dyn Probe>,
        config: ProberConfig,
    ) -> Result<Self, ProbeError> {
        config.validate()?;
        Ok(Self {
            authors,
            probe,
            config,
        })
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Probe one random batch of authors. Must be called inside a Tokio runtime.
    pub async fn run(&self) -> Result<AuthorProbeReport, ProbeError> {
        let start = Instant::now();
        let authors = self.authors.clone();
        let batch_size = self.config.batch_size;
        let sample =
            tokio::task::spawn_blocking(move || authors.get_random_sample(batch_size)).await??;
        info!(sampled = sample.len(), "Author probe run started");

        let mut report = AuthorProbeReport {
            sampled: sample.len(),
            ..Default::default()
        };
        let targets = sample
            .into_iter()
            .map(|author| {
                let url = author.source_url.clone();
                (author, url)
            })
            .collect();
        let run = probe_all(&self.probe, &self.config, targets).await?;
        report.record_errors += run.lost;

        let authors = self.authors.clone();
        let mut report = tokio::task::spawn_blocking(move || {
            for (author, state) in run.completed {
                apply(&authors, author, state, &mut report);
            }
            report
        })
        .await?;

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            sampled = report.sampled,
            kept = report.kept,
            removed = report.removed.len(),
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "Author probe run complete"
        );
        Ok(report)
    }
}

fn apply(authors: &AuthorStore, author: AuthorRecord, state: ProbeState, report: &mut AuthorProbeReport) {
    match state.outcome() {
        Some(ProbeOutcome::Success(_)) => {
            report.kept += 1;
        }
        Some(ProbeOutcome::Failure(FailureReason::Rejected)) => {
            debug!(email = %author.email, "Author not probed, pool full");
            report.skipped += 1;
        }
        Some(ProbeOutcome::Failure(reason)) => match authors.remove_if_unchanged(&author) {
            Ok(true) => {
                info!(
                    email = %author.email,
                    url = %author.source_url,
                    reason = ?reason,
                    "Removed unreachable author"
                );
                report.removed.push(author.email);
            }
            Ok(false) => report.kept += 1,
            Err(e) => {
                error!(email = %author.email, error = %e, "Failed to remove author");
                report.record_errors += 1;
            }
        },
        None => report.record_errors += 1,
    }
}
