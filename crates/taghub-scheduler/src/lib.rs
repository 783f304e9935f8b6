//! Background job scheduler for the taghub daemon.
//!
//! Wraps `tokio-cron-scheduler` with timezone-aware cron jobs, a status
//! registry, an overlap guard, start jitter, per-run timeouts and graceful
//! shutdown through a `CancellationToken`.
//!
//! ```ignore
//! use taghub_scheduler::{JitterConfig, OverlapPolicy, SchedulerConfig, SchedulerService, TimeoutConfig};
//!
//! let scheduler = SchedulerService::new(SchedulerConfig::default()).await?;
//! scheduler.register_job(
//!     "article_sweep",
//!     "0 30 3 * * *",
//!     None,
//!     OverlapPolicy::Skip,
//!     JitterConfig::new(60),
//!     TimeoutConfig::new(600),
//!     || async { sweep().await },
//! ).await?;
//! scheduler.start().await?;
//! ```

mod config;
mod error;
mod jitter;
mod overlap;
mod registry;
mod scheduler;

#[cfg(feature = "jobs")]
pub mod jobs;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use jitter::{JitterConfig, TimeoutConfig};
pub use overlap::{OverlapGuard, OverlapPolicy, RunGuard};
pub use registry::{JobOutput, JobRegistry, JobResult, JobStatus};
pub use scheduler::{validate_cron_expression, SchedulerService};
