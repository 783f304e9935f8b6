//! Tag index with reference counting.
//!
//! A tag is created the first time its normalized title is seen and is
//! never deleted, even at zero references. Counts change only inside a
//! write transaction.

use std::sync::Arc;

use tracing::{debug, error, warn};

use taghub_types::Tag;

use crate::column_families::{CF_TAGS, CF_TAG_TITLES};
use crate::db::{Storage, Txn};
use crate::error::StorageError;
use crate::keys::{tag_title_key, TagKey};

/// Durable store for [`Tag`] records and the title index.
#[derive(Clone)]
pub struct TagIndex {
    storage: Arc<Storage>,
}

impl TagIndex {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    fn tag_id_for_title_in(&self, txn: &Txn<'_>, title: &str) -> Result<Option<u64>, StorageError> {
        match txn.get(CF_TAG_TITLES, &tag_title_key(title))? {
            Some(bytes) => Ok(Some(decode_tag_id(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_in(&self, txn: &Txn<'_>, tag_id: u64) -> Result<Option<Tag>, StorageError> {
        match txn.get(CF_TAGS, &TagKey::new(tag_id).to_bytes())? {
            Some(bytes) => Ok(Some(Tag::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_in(&self, txn: &mut Txn<'_>, tag: &Tag) -> Result<(), StorageError> {
        txn.put(CF_TAGS, &TagKey::new(tag.id).to_bytes(), &tag.to_bytes()?)
    }

    /// Get or create the tag for `title` and add one reference.
    pub fn resolve_and_bump(&self, txn: &mut Txn<'_>, title: &str) -> Result<Tag, StorageError> {
        let title = Tag::normalize_title(title);
        if title.is_empty() {
            return Err(StorageError::Key("empty tag title".to_string()));
        }

        if let Some(tag_id) = self.tag_id_for_title_in(txn, &title)? {
            let mut tag = self
                .get_in(txn, tag_id)?
                .ok_or_else(|| StorageError::NotFound(format!("tag {} for title '{}'", tag_id, title)))?;
            tag.reference_count += 1;
            self.put_in(txn, &tag)?;
            debug!(tag_id = tag.id, title = %tag.title, count = tag.reference_count, "Tag bumped");
            return Ok(tag);
        }

        let tag = Tag::new(txn.next_tag_id(), title);
        self.put_in(txn, &tag)?;
        txn.put(
            CF_TAG_TITLES,
            &tag_title_key(&tag.title),
            tag.id.to_string().as_bytes(),
        )?;
        debug!(tag_id = tag.id, title = %tag.title, "Tag created");
        Ok(tag)
    }

    /// Drop one reference from a tag, flooring at zero.
    ///
    /// Decrementing a tag that is already at zero means relations and counts
    /// disagree; it is logged as an error and the count stays at zero.
    pub fn decrement(&self, txn: &mut Txn<'_>, tag_id: u64) -> Result<Option<Tag>, StorageError> {
        let Some(mut tag) = self.get_in(txn, tag_id)? else {
            warn!(tag_id, "Decrement of unknown tag ignored");
            return Ok(None);
        };

        if tag.reference_count == 0 {
            error!(tag_id, title = %tag.title, "Tag decremented below zero, reference count out of sync");
            return Ok(Some(tag));
        }

        tag.reference_count -= 1;
        self.put_in(txn, &tag)?;
        Ok(Some(tag))
    }

    /// Look up a tag by title (normalized before lookup).
    pub fn get_by_title(&self, title: &str) -> Result<Option<Tag>, StorageError> {
        let title = Tag::normalize_title(title);
        let Some(bytes) = self.storage.get(CF_TAG_TITLES, &tag_title_key(&title))? else {
            return Ok(None);
        };
        self.get(decode_tag_id(&bytes)?)
    }

    /// Look up a tag by id.
    pub fn get(&self, tag_id: u64) -> Result<Option<Tag>, StorageError> {
        match self.storage.get(CF_TAGS, &TagKey::new(tag_id).to_bytes())? {
            Some(bytes) => Ok(Some(Tag::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The `n` tags with the most references; ties go to the older tag.
    pub fn get_most_referenced(&self, n: usize) -> Result<Vec<Tag>, StorageError> {
        let mut tags = self.all()?;
        tags.sort_by(|a, b| {
            b.reference_count
                .cmp(&a.reference_count)
                .then(a.id.cmp(&b.id))
        });
        tags.truncate(n);
        Ok(tags)
    }

    /// Every tag in creation order.
    pub fn all(&self) -> Result<Vec<Tag>, StorageError> {
        let mut tags = Vec::new();
        self.storage.for_each_value(CF_TAGS, |bytes| {
            tags.push(Tag::from_bytes(bytes)?);
            Ok(())
        })?;
        Ok(tags)
    }
}

fn decode_tag_id(bytes: &[u8]) -> Result<u64, StorageError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StorageError::Key("Invalid tag id in title index".to_string()))
}
