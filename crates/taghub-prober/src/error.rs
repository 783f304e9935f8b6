//! Error types for probe runs and sweeps.

use taghub_ingest::IngestError;
use taghub_storage::StorageError;
use thiserror::Error;

use crate::state::ProbeState;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid prober configuration: {0}")]
    Config(String),

    #[error("Invalid probe transition from {from:?} on {event}")]
    InvalidTransition { from: ProbeState, event: &'static str },
}
