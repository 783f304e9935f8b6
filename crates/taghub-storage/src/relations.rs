//! Tag <-> article join table.
//!
//! Each relation is written twice: once under the tag for listing, once
//! under the article for removal.

use std::sync::Arc;

use crate::column_families::{CF_ARTICLE_TAGS, CF_TAG_ARTICLES};
use crate::db::{Storage, Txn};
use crate::error::StorageError;
use crate::keys::{ArticleTagKey, RelationKey};

/// One page of a listing. `number` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn first(size: usize) -> Self {
        Self { number: 1, size }
    }

    fn offset(&self) -> usize {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }
}

/// Durable store for tag-article relations.
#[derive(Clone)]
pub struct RelationStore {
    storage: Arc<Storage>,
}

impl RelationStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Link a tag to an article.
    pub fn add(&self, txn: &mut Txn<'_>, tag_id: u64, article_id: &str) -> Result<(), StorageError> {
        txn.put(
            CF_TAG_ARTICLES,
            &RelationKey::new(tag_id, article_id).to_bytes(),
            &[],
        )?;
        txn.put(
            CF_ARTICLE_TAGS,
            &ArticleTagKey::new(article_id, tag_id).to_bytes(),
            &[],
        )
    }

    /// Unlink every tag from an article and return the tag ids that were linked.
    pub fn remove_all_for_article(
        &self,
        txn: &mut Txn<'_>,
        article_id: &str,
    ) -> Result<Vec<u64>, StorageError> {
        let prefix = ArticleTagKey::prefix_for_article(article_id);
        let entries = txn.prefix_iterator(CF_ARTICLE_TAGS, &prefix)?;

        let mut tag_ids = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let link = ArticleTagKey::from_bytes(&key)?;
            txn.delete(CF_ARTICLE_TAGS, &key)?;
            txn.delete(
                CF_TAG_ARTICLES,
                &RelationKey::new(link.tag_id, article_id).to_bytes(),
            )?;
            tag_ids.push(link.tag_id);
        }
        Ok(tag_ids)
    }

    /// Article ids linked to a tag, most recent first.
    pub fn list_article_ids_for_tag(&self, tag_id: u64, page: Page) -> Result<Vec<String>, StorageError> {
        let keys = self.storage.prefix_keys_reverse(
            CF_TAG_ARTICLES,
            &RelationKey::prefix_for_tag(tag_id),
            page.offset(),
            page.size,
        )?;
        keys.iter()
            .map(|key| RelationKey::from_bytes(key).map(|k| k.article_id))
            .collect()
    }

    /// Tag ids linked to an article, in tag creation order.
    pub fn tag_ids_for_article(&self, article_id: &str) -> Result<Vec<u64>, StorageError> {
        self.storage
            .prefix_iterator(CF_ARTICLE_TAGS, &ArticleTagKey::prefix_for_article(article_id))?
            .iter()
            .map(|(key, _)| ArticleTagKey::from_bytes(key).map(|k| k.tag_id))
            .collect()
    }

    /// Number of live relations for a tag.
    pub fn count_for_tag(&self, tag_id: u64) -> Result<u64, StorageError> {
        Ok(self
            .storage
            .prefix_iterator(CF_TAG_ARTICLES, &RelationKey::prefix_for_tag(tag_id))?
            .len() as u64)
    }
}
