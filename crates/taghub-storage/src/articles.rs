//! Article persistence.
//!
//! Writes go through a caller-owned [`Txn`] so the coordinator can combine
//! them with tag and relation changes. Reads see committed state only.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use taghub_types::{Article, ArticleDraft};

use crate::column_families::{CF_ARTICLES, CF_ARTICLE_ORIGINAL_IDS};
use crate::db::{Storage, Txn};
use crate::error::StorageError;
use crate::keys::{article_key, original_id_key};

/// Comparison used when filtering articles by failure count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
}

impl Comparison {
    pub fn matches(&self, value: u32, threshold: u32) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::GreaterThanOrEqual => value >= threshold,
            Comparison::LessThan => value < threshold,
        }
    }
}

/// Durable store for [`Article`] records and the original id index.
#[derive(Clone)]
pub struct ArticleStore {
    storage: Arc<Storage>,
}

impl ArticleStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Insert a new article with zeroed counters and return it.
    pub fn insert(&self, txn: &mut Txn<'_>, draft: ArticleDraft) -> Result<Article, StorageError> {
        let article = Article::from_draft(txn.next_article_id(), draft, Utc::now());
        txn.put(CF_ARTICLES, &article_key(&article.id), &article.to_bytes()?)?;
        txn.put(
            CF_ARTICLE_ORIGINAL_IDS,
            &original_id_key(&article.original_id),
            article.id.as_bytes(),
        )?;
        debug!(article_id = %article.id, original_id = %article.original_id, "Staged article insert");
        Ok(article)
    }

    /// Replace an article's content by original id, keeping its counters.
    ///
    /// Returns `NotFound` if no article carries the original id.
    pub fn update_by_original_id(
        &self,
        txn: &mut Txn<'_>,
        original_id: &str,
        draft: ArticleDraft,
    ) -> Result<Article, StorageError> {
        let mut article = self
            .get_by_original_id_in(txn, original_id)?
            .ok_or_else(|| StorageError::NotFound(format!("original id {}", original_id)))?;
        article.apply_draft(draft, Utc::now());
        txn.put(CF_ARTICLES, &article_key(&article.id), &article.to_bytes()?)?;
        Ok(article)
    }

    /// Remove an article and its original id entry.
    ///
    /// Returns the removed article, or `None` if it did not exist.
    pub fn remove(&self, txn: &mut Txn<'_>, article_id: &str) -> Result<Option<Article>, StorageError> {
        let Some(article) = self.get_in(txn, article_id)? else {
            return Ok(None);
        };
        txn.delete(CF_ARTICLES, &article_key(article_id))?;
        txn.delete(CF_ARTICLE_ORIGINAL_IDS, &original_id_key(&article.original_id))?;
        Ok(Some(article))
    }

    /// Read an article inside a transaction.
    pub fn get_in(&self, txn: &Txn<'_>, article_id: &str) -> Result<Option<Article>, StorageError> {
        match txn.get(CF_ARTICLES, &article_key(article_id))? {
            Some(bytes) => Ok(Some(Article::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Resolve an original id inside a transaction.
    pub fn get_by_original_id_in(
        &self,
        txn: &Txn<'_>,
        original_id: &str,
    ) -> Result<Option<Article>, StorageError> {
        let Some(id_bytes) = txn.get(CF_ARTICLE_ORIGINAL_IDS, &original_id_key(original_id))? else {
            return Ok(None);
        };
        let article_id = String::from_utf8(id_bytes)
            .map_err(|e| StorageError::Key(format!("Invalid article id: {}", e)))?;
        self.get_in(txn, &article_id)
    }

    /// Read a committed article.
    pub fn get(&self, article_id: &str) -> Result<Option<Article>, StorageError> {
        match self.storage.get(CF_ARTICLES, &article_key(article_id))? {
            Some(bytes) => Ok(Some(Article::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read a committed article by original id.
    pub fn get_by_original_id(&self, original_id: &str) -> Result<Option<Article>, StorageError> {
        let Some(id_bytes) = self
            .storage
            .get(CF_ARTICLE_ORIGINAL_IDS, &original_id_key(original_id))?
        else {
            return Ok(None);
        };
        let article_id = String::from_utf8(id_bytes)
            .map_err(|e| StorageError::Key(format!("Invalid article id: {}", e)))?;
        self.get(&article_id)
    }

    /// Pick up to `n` distinct articles uniformly at random.
    pub fn get_random_sample(&self, n: usize) -> Result<Vec<Article>, StorageError> {
        self.storage
            .sample_values(CF_ARTICLES, n)?
            .iter()
            .map(|bytes| Article::from_bytes(bytes).map_err(StorageError::from))
            .collect()
    }

    /// Articles whose failure count compares true against `threshold`.
    pub fn query_by_accessibility_failure_count(
        &self,
        comparison: Comparison,
        threshold: u32,
    ) -> Result<Vec<Article>, StorageError> {
        let mut matches = Vec::new();
        self.storage.for_each_value(CF_ARTICLES, |bytes| {
            let article = Article::from_bytes(bytes)?;
            if comparison.matches(article.accessibility_failure_count, threshold) {
                matches.push(article);
            }
            Ok(())
        })?;
        Ok(matches)
    }

    /// Record one probe outcome in its own transaction.
    ///
    /// Returns the updated article, or `None` if it was removed meanwhile.
    pub fn record_accessibility(
        &self,
        article_id: &str,
        success: bool,
    ) -> Result<Option<Article>, StorageError> {
        let mut txn = self.storage.begin();
        let Some(mut article) = self.get_in(&txn, article_id)? else {
            warn!(article_id = %article_id, "Probe outcome for missing article dropped");
            return Ok(None);
        };
        article.record_check(success);
        txn.put(CF_ARTICLES, &article_key(article_id), &article.to_bytes()?)?;
        txn.commit()?;
        Ok(Some(article))
    }

    /// Number of stored articles.
    pub fn count(&self) -> Result<u64, StorageError> {
        self.storage.count_cf_entries(CF_ARTICLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn create_test_store() -> (ArticleStore, Arc<Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        (ArticleStore::new(storage.clone()), storage, temp_dir)
    }

    fn draft(original_id: &str) -> ArticleDraft {
        ArticleDraft {
            original_id: original_id.to_string(),
            title: format!("Post {}", original_id),
            permalink: format!("http://blog.example.com/{}", original_id),
            tag_titles: vec!["rust".to_string()],
            author_email: "x@y.com".to_string(),
            source_host: "http://blog.example.com".to_string(),
            source_title: "Example".to_string(),
            source_version: "1.0.0".to_string(),
            source_name: "Solo".to_string(),
        }
    }

    fn insert(store: &ArticleStore, storage: &Storage, original_id: &str) -> Article {
        let mut txn = storage.begin();
        let article = store.insert(&mut txn, draft(original_id)).unwrap();
        txn.commit().unwrap();
        article
    }

    #[test]
    fn test_insert_and_lookup() {
        let (store, storage, _temp) = create_test_store();
        let article = insert(&store, &storage, "1001");

        assert_eq!(store.get(&article.id).unwrap(), Some(article.clone()));
        assert_eq!(store.get_by_original_id("1001").unwrap(), Some(article));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_update_preserves_counters() {
        let (store, storage, _temp) = create_test_store();
        let article = insert(&store, &storage, "1001");
        store.record_accessibility(&article.id, false).unwrap();

        let mut changed = draft("1001");
        changed.title = "Renamed".to_string();
        let mut txn = storage.begin();
        let updated = store.update_by_original_id(&mut txn, "1001", changed).unwrap();
        txn.commit().unwrap();

        assert_eq!(updated.id, article.id);
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.accessibility_check_count, 1);
        assert_eq!(updated.accessibility_failure_count, 1);
    }

    #[test]
    fn test_update_unknown_original_id() {
        let (store, storage, _temp) = create_test_store();
        let mut txn = storage.begin();
        let result = store.update_by_original_id(&mut txn, "missing", draft("missing"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(txn.is_empty());
    }

    #[test]
    fn test_remove_drops_index() {
        let (store, storage, _temp) = create_test_store();
        let article = insert(&store, &storage, "1001");

        let mut txn = storage.begin();
        let removed = store.remove(&mut txn, &article.id).unwrap();
        txn.commit().unwrap();

        assert_eq!(removed.map(|a| a.id), Some(article.id.clone()));
        assert!(store.get(&article.id).unwrap().is_none());
        assert!(store.get_by_original_id("1001").unwrap().is_none());

        let mut txn = storage.begin();
        assert!(store.remove(&mut txn, &article.id).unwrap().is_none());
    }

    #[test]
    fn test_random_sample_is_distinct_and_bounded() {
        let (store, storage, _temp) = create_test_store();
        for i in 0..10 {
            insert(&store, &storage, &i.to_string());
        }

        let sample = store.get_random_sample(4).unwrap();
        assert_eq!(sample.len(), 4);
        let ids: HashSet<_> = sample.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids.len(), 4);

        assert_eq!(store.get_random_sample(50).unwrap().len(), 10);
        assert!(store.get_random_sample(0).unwrap().is_empty());
    }

    #[test]
    fn test_query_by_failure_count() {
        let (store, storage, _temp) = create_test_store();
        let healthy = insert(&store, &storage, "1");
        let broken = insert(&store, &storage, "2");
        store.record_accessibility(&healthy.id, true).unwrap();
        for _ in 0..3 {
            store.record_accessibility(&broken.id, false).unwrap();
        }

        let over = store
            .query_by_accessibility_failure_count(Comparison::GreaterThan, 2)
            .unwrap();
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].id, broken.id);

        let under = store
            .query_by_accessibility_failure_count(Comparison::LessThan, 1)
            .unwrap();
        assert_eq!(under.len(), 1);
        assert_eq!(under[0].id, healthy.id);
    }

    #[test]
    fn test_record_accessibility_missing_article() {
        let (store, _storage, _temp) = create_test_store();
        assert!(store.record_accessibility("01HZX3N9W4QG8V0Y6Y2C7E5T1M", true).unwrap().is_none());
    }
}
