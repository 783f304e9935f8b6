//! Tag records.
//!
//! Titles are stored lowercase and are unique. The reference count mirrors
//! the number of live article relations for the tag.

use serde::{Deserialize, Serialize};

/// A normalized tag with its reference count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Sequence id; ascending order is creation order
    pub id: u64,
    /// Lowercase title
    pub title: String,
    /// Live relation count
    pub reference_count: u64,
}

impl Tag {
    /// Create a tag seen for the first time.
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            reference_count: 1,
        }
    }

    /// Normalize a raw title the way the index keys it.
    pub fn normalize_title(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tag_starts_referenced() {
        let tag = Tag::new(7, "rust");
        assert_eq!(tag.reference_count, 1);
        assert_eq!(tag.id, 7);
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(Tag::normalize_title("  GoLang "), "golang");
        assert_eq!(Tag::normalize_title("C++"), "c++");
        assert_eq!(Tag::normalize_title("Rust Lang"), "rustlang");
    }
}
