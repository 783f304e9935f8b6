//! Author bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last-post record for one author, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub email: String,
    /// Host of the blog the author last posted from
    pub source_url: String,
    pub last_post_at: DateTime<Utc>,
}

impl AuthorRecord {
    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
