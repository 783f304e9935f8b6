//! RocksDB compaction job.
//!
//! Reclaims space left by removed articles and relations. Runs weekly at
//! 4 AM Sunday by default.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use taghub_storage::Storage;
use taghub_types::JobSettings;

use crate::{JitterConfig, OverlapPolicy, SchedulerError, SchedulerService, TimeoutConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionJobConfig {
    /// Cron expression (default: "0 0 4 * * 0" = 4 AM Sunday)
    pub cron: String,
    pub timezone: String,
    pub jitter_secs: u64,
    pub timeout_secs: u64,
}

impl Default for CompactionJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 4 * * 0".to_string(),
            timezone: "UTC".to_string(),
            jitter_secs: 600,
            timeout_secs: 3600,
        }
    }
}

impl CompactionJobConfig {
    pub fn from_settings(settings: &JobSettings) -> Self {
        Self {
            cron: settings.compaction_cron.clone(),
            timezone: settings.timezone.clone(),
            ..Default::default()
        }
    }
}

/// Register the compaction job. Never runs two compactions at once.
pub async fn create_compaction_job(
    scheduler: &SchedulerService,
    storage: Arc<Storage>,
    config: CompactionJobConfig,
) -> Result<(), SchedulerError> {
    scheduler
        .register_job(
            "rocksdb_compaction",
            &config.cron,
            Some(&config.timezone),
            OverlapPolicy::Skip,
            JitterConfig::new(config.jitter_secs),
            TimeoutConfig::new(config.timeout_secs),
            move || {
                let storage = storage.clone();
                async move {
                    info!("Starting manual compaction");
                    tokio::task::spawn_blocking(move || storage.compact())
                        .await
                        .map_err(|e| e.to_string())?
                        .map(|_| info!("Compaction complete"))
                        .map_err(|e| e.to_string())
                }
            },
        )
        .await?;

    info!(cron = %config.cron, "Registered compaction job");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = JobSettings {
            compaction_cron: "0 0 5 * * 6".to_string(),
            timezone: "Asia/Shanghai".to_string(),
            ..Default::default()
        };
        let config = CompactionJobConfig::from_settings(&settings);
        assert_eq!(config.cron, "0 0 5 * * 6");
        assert_eq!(config.timezone, "Asia/Shanghai");
        assert_eq!(config.jitter_secs, 600);
        assert_eq!(config.timeout_secs, 3600);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_registers_job() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let scheduler = SchedulerService::new(Default::default()).await.unwrap();

        create_compaction_job(&scheduler, storage, CompactionJobConfig::default())
            .await
            .unwrap();
        assert!(scheduler.registry().is_registered("rocksdb_compaction"));
    }
}
