//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Configuration for the scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default timezone for jobs (IANA name, e.g. "Asia/Shanghai").
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Seconds given to running jobs after shutdown is signalled.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_timezone(timezone: impl Into<String>) -> Self {
        Self {
            default_timezone: timezone.into(),
            ..Default::default()
        }
    }

    /// Parse the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidTimezone` for unknown IANA names.
    pub fn parse_timezone(&self) -> Result<chrono_tz::Tz, SchedulerError> {
        self.default_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| SchedulerError::InvalidTimezone(self.default_timezone.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.shutdown_timeout_secs, 30);
        assert_eq!(config.parse_timezone().unwrap().name(), "UTC");
    }

    #[test]
    fn test_parse_timezone_shanghai() {
        let config = SchedulerConfig::with_timezone("Asia/Shanghai");
        assert_eq!(config.parse_timezone().unwrap().name(), "Asia/Shanghai");
    }

    #[test]
    fn test_parse_invalid_timezone() {
        let config = SchedulerConfig::with_timezone("Invalid/Zone");
        match config.parse_timezone() {
            Err(SchedulerError::InvalidTimezone(tz)) => assert_eq!(tz, "Invalid/Zone"),
            other => panic!("Expected InvalidTimezone error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.default_timezone, "UTC");
        assert_eq!(parsed.shutdown_timeout_secs, 30);
    }
}
