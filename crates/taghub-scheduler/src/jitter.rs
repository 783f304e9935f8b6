//! Random start delay for scheduled jobs.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum random delay applied before a job body runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JitterConfig {
    /// 0 disables jitter
    pub max_jitter_secs: u64,
}

impl JitterConfig {
    pub fn new(max_jitter_secs: u64) -> Self {
        Self { max_jitter_secs }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// A delay in `[0, max_jitter_secs)`.
    pub fn generate_jitter(&self) -> Duration {
        if self.max_jitter_secs == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::rng().random_range(0..self.max_jitter_secs * 1000);
        Duration::from_millis(jitter_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_jitter_secs > 0
    }
}

/// Per-run deadline for a job body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// 0 means no deadline
    pub timeout_secs: u64,
}

impl TimeoutConfig {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn duration(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_jitter_is_immediate() {
        let config = JitterConfig::none();
        assert_eq!(config.generate_jitter(), Duration::ZERO);
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_jitter_within_bounds() {
        let config = JitterConfig::new(2);
        assert!(config.is_enabled());
        for _ in 0..200 {
            assert!(config.generate_jitter() < Duration::from_secs(2));
        }
    }

    #[test]
    fn test_timeout_duration() {
        assert_eq!(TimeoutConfig::new(0).duration(), None);
        assert_eq!(
            TimeoutConfig::new(90).duration(),
            Some(Duration::from_secs(90))
        );
    }
}
