//! Author last-post records.

use std::sync::Arc;

use tracing::debug;

use taghub_types::AuthorRecord;

use crate::column_families::CF_AUTHORS;
use crate::db::{Storage, Txn};
use crate::error::StorageError;
use crate::keys::author_key;

/// Durable store for [`AuthorRecord`]s keyed by email.
#[derive(Clone)]
pub struct AuthorStore {
    storage: Arc<Storage>,
}

impl AuthorStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Insert or replace the record for `record.email`.
    pub fn upsert(&self, txn: &mut Txn<'_>, record: &AuthorRecord) -> Result<(), StorageError> {
        txn.put(CF_AUTHORS, &author_key(&record.email), &record.to_bytes()?)
    }

    /// Delete the record for `email`. Returns whether it existed.
    pub fn remove(&self, txn: &mut Txn<'_>, email: &str) -> Result<bool, StorageError> {
        if self.get_in(txn, email)?.is_none() {
            return Ok(false);
        }
        txn.delete(CF_AUTHORS, &author_key(email))?;
        Ok(true)
    }

    /// Delete `record` in its own transaction, unless the author posted
    /// again since it was read.
    pub fn remove_if_unchanged(&self, record: &AuthorRecord) -> Result<bool, StorageError> {
        let mut txn = self.storage.begin();
        match self.get_in(&txn, &record.email)? {
            Some(current) if current == *record => {}
            Some(_) => {
                debug!(email = %record.email, "Author posted again, kept");
                return Ok(false);
            }
            None => return Ok(false),
        }
        self.remove(&mut txn, &record.email)?;
        txn.commit()?;
        Ok(true)
    }

    pub fn get_in(&self, txn: &Txn<'_>, email: &str) -> Result<Option<AuthorRecord>, StorageError> {
        match txn.get(CF_AUTHORS, &author_key(email))? {
            Some(bytes) => Ok(Some(AuthorRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get(&self, email: &str) -> Result<Option<AuthorRecord>, StorageError> {
        match self.storage.get(CF_AUTHORS, &author_key(email))? {
            Some(bytes) => Ok(Some(AuthorRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Pick up to `n` distinct authors uniformly at random.
    pub fn get_random_sample(&self, n: usize) -> Result<Vec<AuthorRecord>, StorageError> {
        self.storage
            .sample_values(CF_AUTHORS, n)?
            .iter()
            .map(|bytes| AuthorRecord::from_bytes(bytes).map_err(StorageError::from))
            .collect()
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        self.storage.count_cf_entries(CF_AUTHORS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_upsert_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let authors = AuthorStore::new(storage.clone());

        let mut record = AuthorRecord {
            email: "x@y.com".to_string(),
            source_url: "http://old.example.com".to_string(),
            last_post_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        };
        let mut txn = storage.begin();
        authors.upsert(&mut txn, &record).unwrap();
        txn.commit().unwrap();

        record.source_url = "http://new.example.com".to_string();
        let mut txn = storage.begin();
        authors.upsert(&mut txn, &record).unwrap();
        txn.commit().unwrap();

        assert_eq!(authors.get("x@y.com").unwrap(), Some(record));
        assert!(authors.get("nobody@y.com").unwrap().is_none());
    }

    fn record(email: &str, millis: i64) -> AuthorRecord {
        AuthorRecord {
            email: email.to_string(),
            source_url: format!("http://{}.example.com", email.replace('@', "-")),
            last_post_at: Utc.timestamp_millis_opt(millis).unwrap(),
        }
    }

    #[test]
    fn test_remove_and_sample() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let authors = AuthorStore::new(storage.clone());

        let mut txn = storage.begin();
        for i in 0..5 {
            authors.upsert(&mut txn, &record(&format!("a{}@y.com", i), 1_000)).unwrap();
        }
        txn.commit().unwrap();
        assert_eq!(authors.count().unwrap(), 5);
        assert_eq!(authors.get_random_sample(3).unwrap().len(), 3);
        assert_eq!(authors.get_random_sample(10).unwrap().len(), 5);

        let mut txn = storage.begin();
        assert!(authors.remove(&mut txn, "a0@y.com").unwrap());
        assert!(!authors.remove(&mut txn, "nobody@y.com").unwrap());
        drop(txn);
        assert_eq!(authors.count().unwrap(), 5);

        let mut txn = storage.begin();
        authors.remove(&mut txn, "a0@y.com").unwrap();
        txn.commit().unwrap();
        assert!(authors.get("a0@y.com").unwrap().is_none());
        assert_eq!(authors.count().unwrap(), 4);
    }

    #[test]
    fn test_remove_if_unchanged_keeps_fresh_posts() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let authors = AuthorStore::new(storage.clone());

        let sampled = record("x@y.com", 1_000);
        let mut txn = storage.begin();
        authors.upsert(&mut txn, &sampled).unwrap();
        txn.commit().unwrap();

        let mut txn = storage.begin();
        authors.upsert(&mut txn, &record("x@y.com", 2_000)).unwrap();
        txn.commit().unwrap();

        assert!(!authors.remove_if_unchanged(&sampled).unwrap());
        assert!(authors.get("x@y.com").unwrap().is_some());

        let current = authors.get("x@y.com").unwrap().unwrap();
        assert!(authors.remove_if_unchanged(&current).unwrap());
        assert!(authors.get("x@y.com").unwrap().is_none());
        assert!(!authors.remove_if_unchanged(&current).unwrap());
    }
}
