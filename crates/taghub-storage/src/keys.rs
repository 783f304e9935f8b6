//! Key encoding and decoding for storage layer.
//!
//! Formats:
//! - article: `art:{ulid}`
//! - original id index: `oid:{original_id}`
//! - tag: `tag:{tag_id:020}`
//! - tag title index: `ttl:{title}`
//! - tag -> article relation: `rel:{tag_id:020}:{article_ulid}`
//! - article -> tag relation: `atg:{article_ulid}:{tag_id:020}`
//! - author: `ath:{email}`
//!
//! Zero-padded tag ids and ULIDs sort lexicographically in creation order,
//! so range scans come out ordered without decoding values.

use crate::error::StorageError;

/// Encode an article key.
pub fn article_key(article_id: &str) -> Vec<u8> {
    format!("art:{}", article_id).into_bytes()
}

/// Encode an original id index key.
pub fn original_id_key(original_id: &str) -> Vec<u8> {
    format!("oid:{}", original_id).into_bytes()
}

/// Encode a tag title index key. The title must already be normalized.
pub fn tag_title_key(title: &str) -> Vec<u8> {
    format!("ttl:{}", title).into_bytes()
}

/// Encode an author key.
pub fn author_key(email: &str) -> Vec<u8> {
    format!("ath:{}", email).into_bytes()
}

fn utf8(bytes: &[u8]) -> Result<&str, StorageError> {
    std::str::from_utf8(bytes).map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))
}

fn parse_tag_id(s: &str) -> Result<u64, StorageError> {
    s.parse()
        .map_err(|e| StorageError::Key(format!("Invalid tag id '{}': {}", s, e)))
}

/// Key for tag storage
/// Format: tag:{tag_id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagKey {
    pub tag_id: u64,
}

impl TagKey {
    pub fn new(tag_id: u64) -> Self {
        Self { tag_id }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("tag:{:020}", self.tag_id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let rest = s
            .strip_prefix("tag:")
            .ok_or_else(|| StorageError::Key(format!("Invalid tag key: {}", s)))?;
        Ok(Self {
            tag_id: parse_tag_id(rest)?,
        })
    }
}

/// Key for tag -> article relations
/// Format: rel:{tag_id:020}:{article_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationKey {
    pub tag_id: u64,
    pub article_id: String,
}

impl RelationKey {
    pub fn new(tag_id: u64, article_id: impl Into<String>) -> Self {
        Self {
            tag_id,
            article_id: article_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("rel:{:020}:{}", self.tag_id, self.article_id).into_bytes()
    }

    /// Prefix covering every relation of one tag.
    pub fn prefix_for_tag(tag_id: u64) -> Vec<u8> {
        format!("rel:{:020}:", tag_id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        if parts.len() != 3 || parts[0] != "rel" {
            return Err(StorageError::Key(format!("Invalid relation key: {}", s)));
        }
        Ok(Self {
            tag_id: parse_tag_id(parts[1])?,
            article_id: parts[2].to_string(),
        })
    }
}

/// Key for article -> tag relations
/// Format: atg:{article_id}:{tag_id:020}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleTagKey {
    pub article_id: String,
    pub tag_id: u64,
}

impl ArticleTagKey {
    pub fn new(article_id: impl Into<String>, tag_id: u64) -> Self {
        Self {
            article_id: article_id.into(),
            tag_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("atg:{}:{:020}", self.article_id, self.tag_id).into_bytes()
    }

    /// Prefix covering every relation of one article.
    pub fn prefix_for_article(article_id: &str) -> Vec<u8> {
        format!("atg:{}:", article_id).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = utf8(bytes)?;
        let rest = s
            .strip_prefix("atg:")
            .ok_or_else(|| StorageError::Key(format!("Invalid article tag key: {}", s)))?;
        // Article ids never contain ':', the tag id is the last segment
        let (article_id, tag_id) = rest
            .rsplit_once(':')
            .ok_or_else(|| StorageError::Key(format!("Invalid article tag key: {}", s)))?;
        Ok(Self {
            article_id: article_id.to_string(),
            tag_id: parse_tag_id(tag_id)?,
        })
    }
}
