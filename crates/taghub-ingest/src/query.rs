//! Read-side queries over the tag index.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use taghub_storage::{ArticleStore, Page, RelationStore, TagIndex};
use taghub_types::Tag;

use crate::coordinator::IngestionCoordinator;
use crate::error::IngestError;
use crate::normalize::{bare_host, split_query_tags};

/// Public projection of an article. Nothing else leaves the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub title: String,
    pub permalink: String,
}

/// Tag-based article discovery.
#[derive(Clone)]
pub struct ArticleQuery {
    articles: ArticleStore,
    tags: TagIndex,
    relations: RelationStore,
}

impl ArticleQuery {
    pub fn new(articles: ArticleStore, tags: TagIndex, relations: RelationStore) -> Self {
        Self {
            articles,
            tags,
            relations,
        }
    }

    pub fn from_coordinator(coordinator: &IngestionCoordinator) -> Self {
        Self::new(
            coordinator.articles().clone(),
            coordinator.tags().clone(),
            coordinator.relations().clone(),
        )
    }

    /// Recent articles carrying any of the comma-separated tags.
    ///
    /// Tags are consulted in the given order, newest articles first within
    /// each tag. Articles from `exclude_host` are skipped, whatever scheme
    /// or port it is written with. Never returns duplicates or more than
    /// `page_size` entries.
    pub fn get_articles_by_tags(
        &self,
        tags_csv: &str,
        exclude_host: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<ArticleSummary>, IngestError> {
        let titles = split_query_tags(tags_csv);
        if titles.is_empty() {
            return Err(IngestError::ValidationFailed {
                field: "tags",
                reason: "no tags given".to_string(),
            });
        }
        let excluded = exclude_host.map(bare_host).filter(|h| !h.is_empty());

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        'tags: for title in &titles {
            if found.len() >= page_size {
                break;
            }
            let Some(tag) = self.tags.get_by_title(title)? else {
                debug!(tag = %title, "Unknown tag in query");
                continue;
            };

            for article_id in self
                .relations
                .list_article_ids_for_tag(tag.id, Page::first(page_size))?
            {
                let Some(article) = self.articles.get(&article_id)? else {
                    warn!(tag_id = tag.id, article_id = %article_id, "Relation points at missing article");
                    continue;
                };
                if excluded.as_deref() == Some(bare_host(&article.source_host).as_str()) {
                    continue;
                }
                if !seen.insert(article.id.clone()) {
                    continue;
                }
                found.push(ArticleSummary {
                    title: article.title,
                    permalink: article.permalink,
                });
                if found.len() >= page_size {
                    break 'tags;
                }
            }
        }

        debug!(tags = %tags_csv, count = found.len(), "Articles by tags");
        Ok(found)
    }

    /// The `n` most referenced tags.
    pub fn get_most_used_tags(&self, n: usize) -> Result<Vec<Tag>, IngestError> {
        Ok(self.tags.get_most_referenced(n)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ArticleInput;
    use crate::rate_limit::RateLimiter;
    use crate::relay::DisabledRelay;
    use crate::sanitize::EscapeSanitizer;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use taghub_storage::Storage;
    use taghub_types::IngestSettings;
    use tempfile::TempDir;

    fn setup() -> (IngestionCoordinator, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let coordinator = IngestionCoordinator::new(
            storage,
            Arc::new(RateLimiter::new(Duration::ZERO)),
            Arc::new(EscapeSanitizer),
            Arc::new(DisabledRelay),
            IngestSettings::default(),
        );
        (coordinator, temp)
    }

    fn add(coordinator: &IngestionCoordinator, id: &str, host: &str, tags: &str) {
        coordinator
            .add_article(
                ArticleInput {
                    original_id: id.to_string(),
                    title: format!("Post {}", id),
                    permalink: format!("/{}", id),
                    tags: tags.to_string(),
                    author_email: format!("{}@y.com", id),
                    source_host: host.to_string(),
                    source_title: "Blog".to_string(),
                    source_version: "1.0.0".to_string(),
                    source_name: "Solo".to_string(),
                    post_to_community: false,
                },
                Utc::now(),
            )
            .unwrap();
    }

    #[test]
    fn test_newest_first_projection() {
        let (coordinator, _temp) = setup();
        add(&coordinator, "a", "one.example.com", "rust");
        add(&coordinator, "b", "two.example.com", "rust");

        let query = ArticleQuery::from_coordinator(&coordinator);
        let found = query.get_articles_by_tags("Rust", None, 10).unwrap();
        assert_eq!(
            found,
            vec![
                ArticleSummary {
                    title: "Post b".to_string(),
                    permalink: "http://two.example.com/b".to_string(),
                },
                ArticleSummary {
                    title: "Post a".to_string(),
                    permalink: "http://one.example.com/a".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_excludes_host_any_form() {
        let (coordinator, _temp) = setup();
        add(&coordinator, "a", "http://one.example.com:8080", "rust");
        add(&coordinator, "b", "two.example.com", "rust");

        let query = ArticleQuery::from_coordinator(&coordinator);
        let found = query
            .get_articles_by_tags("rust", Some("https://ONE.example.com"), 10)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Post b");
    }

    #[test]
    fn test_no_duplicates_and_page_bound() {
        let (coordinator, _temp) = setup();
        add(&coordinator, "a", "one.example.com", "rust, go");
        add(&coordinator, "b", "one.example.com", "go");
        add(&coordinator, "c", "one.example.com", "rust");

        let query = ArticleQuery::from_coordinator(&coordinator);
        let all = query.get_articles_by_tags("rust,go", None, 10).unwrap();
        let titles: Vec<&str> = all.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Post c", "Post a", "Post b"]);

        let bounded = query.get_articles_by_tags("rust,go", None, 2).unwrap();
        assert_eq!(bounded.len(), 2);
    }

    #[test]
    fn test_unknown_and_empty_tags() {
        let (coordinator, _temp) = setup();
        let query = ArticleQuery::from_coordinator(&coordinator);
        assert!(query.get_articles_by_tags("nothing", None, 5).unwrap().is_empty());
        assert!(matches!(
            query.get_articles_by_tags(" , ", None, 5),
            Err(IngestError::ValidationFailed { field: "tags", .. })
        ));
    }

    #[test]
    fn test_query_tags_match_ingested_spelling() {
        let (coordinator, _temp) = setup();
        add(&coordinator, "a", "one.example.com", "Rust Lang");

        let query = ArticleQuery::from_coordinator(&coordinator);
        let found = query.get_articles_by_tags("rust lang", None, 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Post a");
    }

    #[test]
    fn test_most_used_tags() {
        let (coordinator, _temp) = setup();
        add(&coordinator, "a", "one.example.com", "go, rust");
        add(&coordinator, "b", "one.example.com", "rust");

        let query = ArticleQuery::from_coordinator(&coordinator);
        let top = query.get_most_used_tags(1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].title, "rust");
        assert_eq!(top[0].reference_count, 2);
    }
}
