//! Rate-limit map pruning job.
//!
//! Entries older than the minimum post interval no longer limit anyone;
//! dropping them keeps the in-memory map bounded by recent authors.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use taghub_ingest::RateLimiter;
use taghub_types::JobSettings;

use crate::{JitterConfig, JobOutput, OverlapPolicy, SchedulerError, SchedulerService, TimeoutConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPruneJobConfig {
    /// Cron expression (default: "0 */10 * * * *")
    pub cron: String,
    pub timezone: String,
}

impl Default for RateLimitPruneJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 */10 * * * *".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

impl RateLimitPruneJobConfig {
    pub fn from_settings(settings: &JobSettings) -> Self {
        Self {
            cron: settings.rate_limit_prune_cron.clone(),
            timezone: settings.timezone.clone(),
        }
    }
}

pub async fn create_rate_limit_prune_job(
    scheduler: &SchedulerService,
    limiter: Arc<RateLimiter>,
    config: RateLimitPruneJobConfig,
) -> Result<(), SchedulerError> {
    scheduler
        .register_job_with_metadata(
            "rate_limit_prune",
            &config.cron,
            Some(&config.timezone),
            OverlapPolicy::Skip,
            JitterConfig::none(),
            TimeoutConfig::new(60),
            move || {
                let limiter = limiter.clone();
                async move {
                    let pruned = limiter.prune(Utc::now());
                    Ok(JobOutput::new()
                        .with_metadata("pruned", pruned)
                        .with_metadata("remaining", limiter.len()))
                }
            },
        )
        .await?;

    info!(cron = %config.cron, "Registered rate limit prune job");
    Ok(())
}
