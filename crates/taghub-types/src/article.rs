//! Article records pushed by member blogs.
//!
//! An article is keyed by a server-assigned ULID and carries the
//! client-assigned `original_id` used for updates. The accessibility
//! counters are owned by the prober and survive updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validated article fields supplied on add or update.
///
/// Everything except identity and probe counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    /// Client-assigned identifier, unique per hub
    pub original_id: String,
    /// Sanitized title
    pub title: String,
    /// Absolute permalink
    pub permalink: String,
    /// Normalized, deduplicated tag titles in first-seen order
    pub tag_titles: Vec<String>,
    /// Author email, also the rate-limit key
    pub author_email: String,
    /// Normalized source host, e.g. `http://blog.example.com`
    pub source_host: String,
    /// Title of the source blog
    pub source_title: String,
    /// Version of the blog software that pushed the article
    pub source_version: String,
    /// Name of the blog software that pushed the article
    pub source_name: String,
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Server-assigned ULID
    pub id: String,
    pub original_id: String,
    pub title: String,
    pub permalink: String,
    pub tag_titles: Vec<String>,
    pub author_email: String,
    pub source_host: String,
    pub source_title: String,
    pub source_version: String,
    pub source_name: String,
    /// Number of completed accessibility probes
    #[serde(default)]
    pub accessibility_check_count: u32,
    /// Number of probes that failed (never exceeds the check count)
    #[serde(default)]
    pub accessibility_failure_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Build a fresh article from a draft with zeroed counters.
    pub fn from_draft(id: String, draft: ArticleDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            original_id: draft.original_id,
            title: draft.title,
            permalink: draft.permalink,
            tag_titles: draft.tag_titles,
            author_email: draft.author_email,
            source_host: draft.source_host,
            source_title: draft.source_title,
            source_version: draft.source_version,
            source_name: draft.source_name,
            accessibility_check_count: 0,
            accessibility_failure_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the content fields from a draft, keeping id, counters and creation time.
    pub fn apply_draft(&mut self, draft: ArticleDraft, now: DateTime<Utc>) {
        self.title = draft.title;
        self.permalink = draft.permalink;
        self.tag_titles = draft.tag_titles;
        self.author_email = draft.author_email;
        self.source_host = draft.source_host;
        self.source_title = draft.source_title;
        self.source_version = draft.source_version;
        self.source_name = draft.source_name;
        self.updated_at = now;
    }

    /// Record one probe outcome.
    ///
    /// Both counters saturate so the failure count can never pass the check count.
    pub fn record_check(&mut self, success: bool) {
        self.accessibility_check_count = self.accessibility_check_count.saturating_add(1);
        if !success && self.accessibility_failure_count < self.accessibility_check_count {
            self.accessibility_failure_count += 1;
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
