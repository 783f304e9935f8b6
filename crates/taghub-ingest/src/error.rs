//! Error types for ingestion and queries.

use taghub_storage::StorageError;
use thiserror::Error;

/// Errors returned by the ingestion coordinator and article queries.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The author posted too recently. Nothing was written.
    #[error("Rate limited: retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    /// Input rejected before any write.
    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: &'static str, reason: String },

    /// Article not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage failure; the transaction was rolled back
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IngestError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        IngestError::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors from the downstream relay. Logged, never surfaced to callers.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay endpoint returned status {0}")]
    Status(u16),

    #[error("Relay misconfigured: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::RateLimited { retry_after_ms: 1500 };
        assert!(err.to_string().contains("1500"));

        let err = IngestError::invalid("tags", "no usable tags");
        assert_eq!(err.to_string(), "Validation failed for tags: no usable tags");

        let err = RelayError::Status(503);
        assert!(err.to_string().contains("503"));
    }
}
