//! Overlap policy for scheduled jobs.
//!
//! A probe run that outlives its interval must not be joined by a second run
//! over the same articles; `Skip` drops the late tick instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What to do when a tick fires while the previous run is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverlapPolicy {
    /// Skip the tick and record it as skipped.
    #[default]
    Skip,
    /// Run anyway.
    Concurrent,
}

/// Tracks whether a job is running.
pub struct OverlapGuard {
    is_running: Arc<AtomicBool>,
    policy: OverlapPolicy,
}

impl OverlapGuard {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    /// Returns `None` if this tick must be skipped.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        match self.policy {
            OverlapPolicy::Skip => self
                .is_running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .ok()
                .map(|_| RunGuard {
                    flag: self.is_running.clone(),
                }),
            OverlapPolicy::Concurrent => Some(RunGuard {
                flag: Arc::new(AtomicBool::new(true)),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }
}

/// Clears the running flag on drop, including on panic.
pub struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
