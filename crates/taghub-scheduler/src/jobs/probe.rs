//! Accessibility probe job.
//!
//! Samples a batch of articles and records whether their permalinks still
//! answer 200. Runs every six hours by default.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use taghub_prober::AccessibilityProber;
use taghub_types::JobSettings;

use crate::{JitterConfig, JobOutput, OverlapPolicy, SchedulerError, SchedulerService, TimeoutConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeJobConfig {
    /// Cron expression (default: "0 0 */6 * * *")
    pub cron: String,
    pub timezone: String,
    pub jitter_secs: u64,
}

impl Default for ProbeJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 */6 * * *".to_string(),
            timezone: "UTC".to_string(),
            jitter_secs: 60,
        }
    }
}

impl ProbeJobConfig {
    pub fn from_settings(settings: &JobSettings) -> Self {
        Self {
            cron: settings.probe_cron.clone(),
            timezone: settings.timezone.clone(),
            ..Default::default()
        }
    }
}

/// Register the probe job.
///
/// The job timeout is the prober's worst-case run time plus a minute, so a
/// run is never cut short while its own per-task deadlines still hold.
pub async fn create_probe_job(
    scheduler: &SchedulerService,
    prober: Arc<AccessibilityProber>,
    config: ProbeJobConfig,
) -> Result<(), SchedulerError> {
    let timeout_secs = prober.config().worst_case_run().as_secs() + 60;

    scheduler
        .register_job_with_metadata(
            "article_probe",
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
                                .with_metadata("succeeded", report.succeeded)
                                .with_metadata("failed", report.failed)
                                .with_metadata("timed_out", report.timed_out)
                                .with_metadata("rejected", report.rejected)
                        })
                        .map_err(|e| format!("Probe run failed: {}", e))
                }
            },
        )
        .await?;

    info!(cron = %config.cron, timeout_secs, "Registered probe job");
    Ok(())
}
