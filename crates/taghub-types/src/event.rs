//! Events emitted after a committed ingestion.

use serde::{Deserialize, Serialize};

use crate::Article;

/// What happened to the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleEventKind {
    ArticleAdded,
    ArticleUpdated,
}

impl ArticleEventKind {
    /// Stable name used in logs and relay payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleEventKind::ArticleAdded => "article_added",
            ArticleEventKind::ArticleUpdated => "article_updated",
        }
    }
}

/// A committed article change handed to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleEvent {
    pub kind: ArticleEventKind,
    pub article: Article,
}

impl ArticleEvent {
    pub fn added(article: Article) -> Self {
        Self {
            kind: ArticleEventKind::ArticleAdded,
            article,
        }
    }

    pub fn updated(article: Article) -> Self {
        Self {
            kind: ArticleEventKind::ArticleUpdated,
            article,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ArticleEventKind::ArticleUpdated).unwrap();
        assert_eq!(json, "\"article_updated\"");
        assert_eq!(ArticleEventKind::ArticleAdded.as_str(), "article_added");
    }
}
