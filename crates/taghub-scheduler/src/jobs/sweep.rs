//! Unreachable-article sweep job.
//!
//! Removes articles whose probe failure count passed the threshold. Runs
//! daily at 3:30 AM by default.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use taghub_prober::AccessibilityProber;
use taghub_types::JobSettings;

use crate::{JitterConfig, JobOutput, OverlapPolicy, SchedulerError, SchedulerService, TimeoutConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepJobConfig {
    /// Cron expression (default: "0 30 3 * * *")
    pub cron: String,
    pub timezone: String,
    pub jitter_secs: u64,
    pub timeout_secs: u64,
}

impl Default for SweepJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 30 3 * * *".to_string(),
            timezone: "UTC".to_string(),
            jitter_secs: 60,
            timeout_secs: 600,
        }
    }
}

impl SweepJobConfig {
    pub fn from_settings(settings: &JobSettings) -> Self {
        Self {
            cron: settings.sweep_cron.clone(),
            timezone: settings.timezone.clone(),
            ..Default::default()
        }
    }
}

pub async fn create_sweep_job(
    scheduler: &SchedulerService,
    prober: Arc<AccessibilityProber>,
    config: SweepJobConfig,
) -> Result<(), SchedulerError> {
    scheduler
        .register_job_with_metadata(
            "article_sweep",
            &config.cron,
            Some(&config.timezone),
            OverlapPolicy::Skip,
            JitterConfig::new(config.jitter_secs),
            TimeoutConfig::new(config.timeout_secs),
            move || {
                let prober = prober.clone();
                async move {
                    prober
                        .sweep()
                        .await
                        .map(|report| {
                            JobOutput::new()
                                .with_metadata("candidates", report.candidates)
                                .with_metadata("removed", report.removed.len())
                        })
                        .map_err(|e| format!("Sweep failed: {}", e))
                }
            },
        )
        .await?;

    info!(cron = %config.cron, "Registered sweep job");
    Ok(())
}
