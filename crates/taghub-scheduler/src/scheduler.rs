//! Scheduler service wrapper around tokio-cron-scheduler.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::jitter::{JitterConfig, TimeoutConfig};
use crate::overlap::{OverlapGuard, OverlapPolicy};
use crate::registry::{JobOutput, JobRegistry, JobResult};
use crate::{SchedulerConfig, SchedulerError};

/// Validate a 6-field cron expression (sec min hour day month weekday).
///
/// ```
/// use taghub_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 0 */6 * * *").is_ok());
/// assert!(validate_cron_expression("0 30 3 * * *").is_ok());
/// assert!(validate_cron_expression("invalid").is_err());
/// assert!(validate_cron_expression("").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    Job::new_async(expr, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| SchedulerError::InvalidCron(format!("'{}': {}", expr, e)))
}

/// Owns the cron scheduler, the job registry and the shutdown token.
pub struct SchedulerService {
    scheduler: JobScheduler,
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    shutdown_token: CancellationToken,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a stopped scheduler. Call `start()` to begin running jobs.
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.parse_timezone()?;
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            config,
            registry: Arc::new(JobRegistry::new()),
            shutdown_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.scheduler.start().await?;
        info!(jobs = self.registry.job_count(), "Scheduler started");
        Ok(())
    }

    /// Cancel running jobs, wait up to the shutdown timeout for them to
    /// finish, then stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }
        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();

        let deadline = Instant::now() + Duration::from_secs(self.config.shutdown_timeout_secs);
        while self.registry.get_all_status().iter().any(|s| s.is_running) {
            if Instant::now() >= deadline {
                warn!("Jobs still running at shutdown deadline");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if let Err(e) = self.scheduler.shutdown().await {
            warn!(error = %e, "Error during scheduler shutdown");
        }
        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");
        Ok(())
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a job whose body reports no stats.
    #[allow(clippy::too_many_arguments)]
    pub async fn register_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        overlap: OverlapPolicy,
        jitter: JitterConfig,
        timeout: TimeoutConfig,
        job_fn: F,
    ) -> Result<Uuid, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.register_job_with_metadata(name, cron_expr, timezone, overlap, jitter, timeout, move || {
            let run = job_fn();
            async move { run.await.map(|_| JobOutput::new()) }
        })
        .await
    }

    /// Register a cron job tracked in the registry.
    ///
    /// Each tick: skip if the overlap policy says so, wait the jitter delay,
    /// then run the body under the timeout. Shutdown cancels both waits.
    #[allow(clippy::too_many_arguments)]
    pub async fn register_job_with_metadata<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        overlap: OverlapPolicy,
        jitter: JitterConfig,
        timeout: TimeoutConfig,
        job_fn: F,
    ) -> Result<Uuid, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JobOutput, String>> + Send + 'static,
    {
        let tz: Tz = match timezone {
            Some(tz_str) => Self::parse_timezone(tz_str)?,
            None => self.config.parse_timezone()?,
        };
        validate_cron_expression(cron_expr)?;

        self.registry.register(name, cron_expr);
        let runner = Arc::new(JobRunner {
            name: name.to_string(),
            registry: self.registry.clone(),
            guard: OverlapGuard::new(overlap),
            token: self.shutdown_token.clone(),
            jitter,
            timeout,
        });
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async_tz(cron_expr, tz, move |_uuid, _lock| {
            let runner = runner.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                runner.run(|| job_fn()).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let uuid = self.scheduler.add(job).await?;
        info!(job = %name, uuid = %uuid, cron = %cron_expr, timezone = %tz.name(), "Job registered");
        Ok(uuid)
    }

    pub fn parse_timezone(tz_str: &str) -> Result<Tz, SchedulerError> {
        tz_str
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(tz_str.to_string()))
    }
}

/// Per-job execution policy shared by every tick of one job.
struct JobRunner {
    name: String,
    registry: Arc<JobRegistry>,
    guard: OverlapGuard,
    token: CancellationToken,
    jitter: JitterConfig,
    timeout: TimeoutConfig,
}

impl JobRunner {
    async fn run<M, Fut>(&self, make: M) -> JobResult
    where
        M: FnOnce() -> Fut,
        Fut: Future<Output = Result<JobOutput, String>>,
    {
        let name = self.name.as_str();
        if self.token.is_cancelled() {
            debug!(job = %name, "Shutdown in progress, tick ignored");
            return JobResult::Skipped("shutdown".to_string());
        }
        let Some(_run) = self.guard.try_acquire() else {
            let result = JobResult::Skipped("previous run still active".to_string());
            warn!(job = %name, "Previous run still active, skipping");
            self.registry.record_complete(name, result.clone(), 0);
            return result;
        };

        let delay = self.jitter.generate_jitter();
        if !delay.is_zero() {
            debug!(job = %name, jitter_ms = delay.as_millis() as u64, "Applying jitter delay");
            tokio::select! {
                _ = self.token.cancelled() => return JobResult::Skipped("shutdown".to_string()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(job = %name, "Job started");
        self.registry.record_start(name);
        let start = Instant::now();

        let body = make();
        let outcome = tokio::select! {
            _ = self.token.cancelled() => Err("cancelled by shutdown".to_string()),
            outcome = async {
                match self.timeout.duration() {
                    Some(limit) => tokio::time::timeout(limit, body)
                        .await
                        .unwrap_or_else(|_| Err(format!("timed out after {}s", limit.as_secs()))),
                    None => body.await,
                }
            } => outcome,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let (result, metadata) = match outcome {
            Ok(output) => {
                info!(job = %name, duration_ms, "Job completed");
                (JobResult::Success, output.metadata)
            }
            Err(e) => {
                warn!(job = %name, duration_ms, error = %e, "Job failed");
                (JobResult::Failed(e), Default::default())
            }
        };
        self.registry
            .record_complete_with_metadata(name, result.clone(), duration_ms, metadata);
        result
    }
}
