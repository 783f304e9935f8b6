//! Author reachability job.
//!
//! Samples author records and drops those whose blog no longer answers 200.
//! Runs daily at 5:00 AM by default.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use taghub_prober::AuthorProber;
use taghub_types::JobSettings;

use crate::{JitterConfig, JobOutput, OverlapPolicy, SchedulerError, SchedulerService, TimeoutConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorProbeJobConfig {
    /// Cron expression (default: "0 0 5 * * *")
    pub cron: String,
    pub timezone: String,
    pub jitter_secs: u64,
}

impl Default for AuthorProbeJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 5 * * *".to_string(),
            timezone: "UTC".to_string(),
            jitter_secs: 60,
        }
    }
}

impl AuthorProbeJobConfig {
    pub fn from_settings(settings: &JobSettings) -> Self {
        Self {
            cron: settings.author_probe_cron.clone(),
            timezone: settings.timezone.clone(),
            ..Default::default()
        }
    }
}

/// Register the author probe job. Its timeout follows the article probe job.
pub async fn create_author_probe_job(
    scheduler: &SchedulerService,
    prober: Arc<AuthorProber>,
    config: AuthorProbeJobConfig,
) -> Result<(), SchedulerError> {
    let timeout_secs = prober.config().worst_case_run().as_secs() + 60;

    scheduler
        .register_job_with_metadata(
            "author_probe",
            &config.cron,
            Some(&config.timezone),
            OverlapPolicy::Skip,
            JitterConfig::new(config.jitter_secs),
            TimeoutConfig::new(timeout_secs),
            move || {
                let prober = prober.clone();
                async move {
                    prober
                        .run()
                        .await
                        .map(|report| {
                            JobOutput::new()
                                .with_metadata("sampled", report.sampled)
                                .with_metadata("kept", report.kept)
                                .with_metadata("removed", report.removed.len())
                                .with_metadata("skipped", report.skipped)
                        })
                        .map_err(|e| format!("Author probe run failed: {}", e))
                }
            },
        )
        .await?;

    info!(cron = %config.cron, timeout_secs, "Registered author probe job");
    Ok(())
}
