//! Job definitions registered by the daemon.
//!
//! - **probe**: accessibility probe run over a random article sample
//! - **sweep**: removal of articles that failed too many probes
//! - **author_probe**: removal of authors whose blog no longer answers
//! - **rate_limit_prune**: drops expired per-author rate-limit entries
//! - **compaction**: RocksDB manual compaction

pub mod author_probe;
pub mod compaction;
pub mod probe;
pub mod rate_limit_prune;
pub mod sweep;

pub use author_probe::{create_author_probe_job, AuthorProbeJobConfig};
pub use compaction::{create_compaction_job, CompactionJobConfig};
pub use probe::{create_probe_job, ProbeJobConfig};
pub use rate_limit_prune::{create_rate_limit_prune_job, RateLimitPruneJobConfig};
pub use sweep::{create_sweep_job, SweepJobConfig};
