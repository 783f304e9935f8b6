//! Job registry: last run, duration, result and counts per job.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a job execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobResult {
    Success,
    Failed(String),
    /// Not run, e.g. the previous run was still active
    Skipped(String),
}

/// Stats a job reports back to the registry.
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    pub metadata: HashMap<String, String>,
}

impl JobOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// Status of a registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_name: String,
    pub cron_expr: String,
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_result: Option<JobResult>,
    pub run_count: u64,
    pub error_count: u64,
    pub is_running: bool,
    #[serde(default)]
    pub last_run_metadata: HashMap<String, String>,
}

impl JobStatus {
    pub fn new(job_name: String, cron_expr: String) -> Self {
        Self {
            job_name,
            cron_expr,
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            run_count: 0,
            error_count: 0,
            is_running: false,
            last_run_metadata: HashMap::new(),
        }
    }
}

/// Thread-safe registry of job status.
///
/// ```
/// use taghub_scheduler::{JobRegistry, JobResult};
///
/// let registry = JobRegistry::new();
/// registry.register("article_sweep", "0 30 3 * * *");
///
/// registry.record_start("article_sweep");
/// assert!(registry.is_running("article_sweep"));
///
/// registry.record_complete("article_sweep", JobResult::Success, 1500);
/// assert!(!registry.is_running("article_sweep"));
/// ```
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job, replacing any previous status under that name.
    pub fn register(&self, job_name: &str, cron_expr: &str) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(
            job_name.to_string(),
            JobStatus::new(job_name.to_string(), cron_expr.to_string()),
        );
    }

    pub fn record_start(&self, job_name: &str) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = jobs.get_mut(job_name) {
            status.is_running = true;
        }
    }

    pub fn record_complete(&self, job_name: &str, result: JobResult, duration_ms: u64) {
        self.record_complete_with_metadata(job_name, result, duration_ms, HashMap::new());
    }

    /// Record a finished (or skipped) run. Failures bump `error_count`.
    pub fn record_complete_with_metadata(
        &self,
        job_name: &str,
        result: JobResult,
        duration_ms: u64,
        metadata: HashMap<String, String>,
    ) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = jobs.get_mut(job_name) {
            status.is_running = false;
            status.last_run = Some(Utc::now());
            status.last_duration_ms = Some(duration_ms);
            status.run_count += 1;
            if matches!(result, JobResult::Failed(_)) {
                status.error_count += 1;
            }
            status.last_result = Some(result);
            status.last_run_metadata = metadata;
        }
    }

    pub fn get_status(&self, job_name: &str) -> Option<JobStatus> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_name)
            .cloned()
    }

    /// All statuses, sorted by job name.
    pub fn get_all_status(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        all
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.get_status(job_name).is_some_and(|s| s.is_running)
    }

    pub fn is_registered(&self, job_name: &str) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(job_name)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let registry = JobRegistry::new();
        registry.register("article_probe", "0 0 */6 * * *");

        let status = registry.get_status("article_probe").unwrap();
        assert_eq!(status.job_name, "article_probe");
        assert_eq!(status.cron_expr, "0 0 */6 * * *");
        assert_eq!(status.run_count, 0);
        assert!(!status.is_running);
        assert!(registry.is_registered("article_probe"));
    }

    #[test]
    fn test_record_success_with_metadata() {
        let registry = JobRegistry::new();
        registry.register("article_probe", "0 0 */6 * * *");
        registry.record_start("article_probe");
        assert!(registry.is_running("article_probe"));

        let output = JobOutput::new().with_metadata("sampled", 200);
        registry.record_complete_with_metadata(
            "article_probe",
            JobResult::Success,
            1500,
            output.metadata,
        );

        let status = registry.get_status("article_probe").unwrap();
        assert!(!status.is_running);
        assert!(status.last_run.is_some());
        assert_eq!(status.last_duration_ms, Some(1500));
        assert_eq!(status.run_count, 1);
        assert_eq!(status.error_count, 0);
        assert_eq!(status.last_run_metadata.get("sampled").unwrap(), "200");
    }

    #[test]
    fn test_failure_and_skip_counts() {
        let registry = JobRegistry::new();
        registry.register("article_sweep", "0 30 3 * * *");

        registry.record_complete("article_sweep", JobResult::Failed("storage".into()), 10);
        registry.record_complete("article_sweep", JobResult::Skipped("overlap".into()), 0);

        let status = registry.get_status("article_sweep").unwrap();
        assert_eq!(status.run_count, 2);
        assert_eq!(status.error_count, 1);
        assert_eq!(
            status.last_result,
            Some(JobResult::Skipped("overlap".into()))
        );
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let registry = JobRegistry::new();
        registry.record_start("unknown");
        registry.record_complete("unknown", JobResult::Success, 100);
        assert!(registry.get_status("unknown").is_none());
        assert!(!registry.is_running("unknown"));
        assert_eq!(registry.job_count(), 0);
    }

    #[test]
    fn test_all_status_sorted() {
        let registry = JobRegistry::new();
        registry.register("rocksdb_compaction", "0 0 4 * * 0");
        registry.register("article_probe", "0 0 */6 * * *");

        let names: Vec<String> = registry
            .get_all_status()
            .into_iter()
            .map(|s| s.job_name)
            .collect();
        assert_eq!(names, vec!["article_probe", "rocksdb_compaction"]);
    }
}
