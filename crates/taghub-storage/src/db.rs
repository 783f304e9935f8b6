//! RocksDB wrapper for taghub storage.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Serialized write transactions over a `WriteBatch`
//! - Single-key and prefix reads
//! - Id allocation for articles and tags

use rand::Rng;
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use ulid::{Generator, Ulid};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_ARTICLES, CF_AUTHORS, CF_TAGS, CF_TAG_ARTICLES,
};
use crate::error::StorageError;
use crate::keys::TagKey;

/// Main storage interface for taghub
pub struct Storage {
    db: DB,
    /// Serializes write transactions
    write_lock: Mutex<()>,
    /// Tag sequence counter; ids are never reused
    tag_sequence: AtomicU64,
    /// Monotonic ULIDs so article ids sort in insertion order
    article_ids: Mutex<Generator>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let tag_sequence = Self::load_tag_sequence(&db)?;
        debug!(next_tag_id = tag_sequence, "Loaded tag sequence");

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
            tag_sequence: AtomicU64::new(tag_sequence),
            article_ids: Mutex::new(Generator::new()),
        })
    }

    /// Load the next tag id from the highest existing key
    fn load_tag_sequence(db: &DB) -> Result<u64, StorageError> {
        let cf = db
            .cf_handle(CF_TAGS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_TAGS.to_string()))?;

        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            let tag_key = TagKey::from_bytes(&key)?;
            return Ok(tag_key.tag_id + 1);
        }
        Ok(1)
    }

    /// Allocate the next tag id.
    pub fn next_tag_id(&self) -> u64 {
        self.tag_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate the next article id.
    pub fn next_article_id(&self) -> String {
        let mut generator = self
            .article_ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Overflow only happens after 2^80 ids in one millisecond
        generator
            .generate()
            .unwrap_or_else(|_| Ulid::new())
            .to_string()
    }

    pub(crate) fn cf(&self, cf_name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf_name.to_string()))
    }

    /// Begin a write transaction.
    ///
    /// Blocks until no other transaction is open. Writes become visible on
    /// `commit`; dropping the transaction discards them.
    pub fn begin(&self) -> Txn<'_> {
        let guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Txn {
            storage: self,
            _guard: guard,
            batch: WriteBatch::default(),
            overlay: HashMap::new(),
            committed: false,
        }
    }

    /// Get a committed value from a column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    /// Collect every committed entry with the given prefix, in key order.
    #[allow(clippy::type_complexity)]
    pub fn prefix_iterator(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(cf_name)?;

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }

    /// Walk keys with the given prefix from the highest down.
    ///
    /// Skips `offset` keys and returns at most `limit`.
    pub fn prefix_keys_reverse(
        &self,
        cf_name: &str,
        prefix: &[u8],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;

        // 0xFF sorts after every printable key byte
        let mut upper = prefix.to_vec();
        upper.push(0xFF);

        let mut results = Vec::new();
        if limit == 0 {
            return Ok(results);
        }

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&upper, Direction::Reverse));

        let mut skipped = 0usize;
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            results.push(key.to_vec());
            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }

    /// Visit every committed value in a column family.
    pub fn for_each_value<F>(&self, cf_name: &str, mut f: F) -> Result<(), StorageError>
    where
        F: FnMut(&[u8]) -> Result<(), StorageError>,
    {
        let cf = self.cf(cf_name)?;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            f(&value)?;
        }
        Ok(())
    }

    /// Pick up to `n` committed values of a column family uniformly at random.
    ///
    /// Single-pass reservoir sample: at most `n` values are held at once.
    pub fn sample_values(&self, cf_name: &str, n: usize) -> Result<Vec<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;
        let mut reservoir: Vec<Vec<u8>> = Vec::new();
        if n == 0 {
            return Ok(reservoir);
        }

        let mut rng = rand::rng();
        for (seen, item) in self.db.iterator_cf(cf, IteratorMode::Start).enumerate() {
            let (_, value) = item?;
            if reservoir.len() < n {
                reservoir.push(value.to_vec());
                continue;
            }
            let slot = rng.random_range(0..=seen);
            if slot < n {
                reservoir[slot] = value.to_vec();
            }
        }
        Ok(reservoir)
    }

    /// Flush all memtables to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            let cf = self.cf(cf_name)?;
            self.db.flush_cf(cf)?;
        }
        Ok(())
    }

    // ===== Admin Operations =====

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        info!("Starting full compaction...");
        self.db.compact_range::<&[u8], &[u8]>(None, None);

        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            article_count: self.count_cf_entries(CF_ARTICLES)?,
            tag_count: self.count_cf_entries(CF_TAGS)?,
            relation_count: self.count_cf_entries(CF_TAG_ARTICLES)?,
            author_count: self.count_cf_entries(CF_AUTHORS)?,
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    pub(crate) fn count_cf_entries(&self, cf_name: &str) -> Result<u64, StorageError> {
        let cf = self.cf(cf_name)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        let mut total_size = 0u64;
        if let Ok(entries) = std::fs::read_dir(self.db.path()) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }
        total_size
    }
}

/// Statistics about the storage.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct StorageStats {
    pub article_count: u64,
    pub tag_count: u64,
    pub relation_count: u64,
    pub author_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

type OverlayKey = (&'static str, Vec<u8>);

/// A serialized write transaction.
///
/// Holds the storage write lock for its whole lifetime, so a
/// read-modify-write inside one transaction never races another writer.
/// Reads see the transaction's own pending writes.
pub struct Txn<'a> {
    storage: &'a Storage,
    _guard: MutexGuard<'a, ()>,
    batch: WriteBatch,
    /// Pending writes; `None` marks a delete
    overlay: HashMap<OverlayKey, Option<Vec<u8>>>,
    committed: bool,
}

impl<'a> Txn<'a> {
    /// Read a value, including this transaction's pending writes.
    pub fn get(&self, cf_name: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(pending) = self.overlay.get(&(cf_name, key.to_vec())) {
            return Ok(pending.clone());
        }
        self.storage.get(cf_name, key)
    }

    /// Stage a put.
    pub fn put(&mut self, cf_name: &'static str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let cf = self.storage.cf(cf_name)?;
        self.batch.put_cf(cf, key, value);
        self.overlay
            .insert((cf_name, key.to_vec()), Some(value.to_vec()));
        Ok(())
    }

    /// Stage a delete.
    pub fn delete(&mut self, cf_name: &'static str, key: &[u8]) -> Result<(), StorageError> {
        let cf = self.storage.cf(cf_name)?;
        self.batch.delete_cf(cf, key);
        self.overlay.insert((cf_name, key.to_vec()), None);
        Ok(())
    }

    /// Entries with the given prefix, merged with pending writes, in key order.
    #[allow(clippy::type_complexity)]
    pub fn prefix_iterator(
        &self,
        cf_name: &'static str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .storage
            .prefix_iterator(cf_name, prefix)?
            .into_iter()
            .collect();

        for ((cf, key), pending) in &self.overlay {
            if *cf != cf_name || !key.starts_with(prefix) {
                continue;
            }
            match pending {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Allocate a tag id. Ids of rolled-back transactions are not reused.
    pub fn next_tag_id(&self) -> u64 {
        self.storage.next_tag_id()
    }

    /// Allocate an article id.
    pub fn next_article_id(&self) -> String {
        self.storage.next_article_id()
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Atomically apply every staged write.
    pub fn commit(mut self) -> Result<(), StorageError> {
        let batch = std::mem::take(&mut self.batch);
        let ops = batch.len();
        if ops > 0 {
            self.storage.db.write(batch)?;
        }
        self.committed = true;
        debug!(ops, "Transaction committed");
        Ok(())
    }
}

impl Drop for Txn<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.batch.is_empty() {
            debug!(ops = self.batch.len(), "Transaction rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_families::CF_TAG_TITLES;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(storage.db.cf_handle(cf_name).is_some(), "missing {}", cf_name);
        }
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let (storage, _temp) = create_test_storage();

        let mut txn = storage.begin();
        txn.put(CF_TAG_TITLES, b"ttl:go", b"1").unwrap();
        assert_eq!(txn.get(CF_TAG_TITLES, b"ttl:go").unwrap(), Some(b"1".to_vec()));
        assert_eq!(storage.get(CF_TAG_TITLES, b"ttl:go").unwrap(), None);
        txn.commit().unwrap();

        assert_eq!(storage.get(CF_TAG_TITLES, b"ttl:go").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_drop_rolls_back() {
        let (storage, _temp) = create_test_storage();

        {
            let mut txn = storage.begin();
            txn.put(CF_TAG_TITLES, b"ttl:go", b"1").unwrap();
        }

        assert_eq!(storage.get(CF_TAG_TITLES, b"ttl:go").unwrap(), None);
        // Lock was released by the drop
        let txn = storage.begin();
        assert!(txn.is_empty());
    }

    #[test]
    fn test_txn_prefix_iterator_merges_pending() {
        let (storage, _temp) = create_test_storage();

        let mut txn = storage.begin();
        txn.put(CF_TAG_TITLES, b"ttl:a", b"1").unwrap();
        txn.put(CF_TAG_TITLES, b"ttl:b", b"2").unwrap();
        txn.commit().unwrap();

        let mut txn = storage.begin();
        txn.delete(CF_TAG_TITLES, b"ttl:a").unwrap();
        txn.put(CF_TAG_TITLES, b"ttl:c", b"3").unwrap();
        let entries = txn.prefix_iterator(CF_TAG_TITLES, b"ttl:").unwrap();
        let keys: Vec<Vec<u8>> = entries.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"ttl:b".to_vec(), b"ttl:c".to_vec()]);
    }

    #[test]
    fn test_prefix_keys_reverse_pages() {
        let (storage, _temp) = create_test_storage();

        let mut txn = storage.begin();
        for i in 0..5 {
            txn.put(CF_TAG_TITLES, format!("ttl:x{}", i).as_bytes(), b"")
                .unwrap();
        }
        txn.put(CF_TAG_TITLES, b"ttl:y0", b"").unwrap();
        txn.commit().unwrap();

        let page = storage
            .prefix_keys_reverse(CF_TAG_TITLES, b"ttl:x", 1, 2)
            .unwrap();
        assert_eq!(page, vec![b"ttl:x3".to_vec(), b"ttl:x2".to_vec()]);

        let tail = storage
            .prefix_keys_reverse(CF_TAG_TITLES, b"ttl:x", 4, 10)
            .unwrap();
        assert_eq!(tail, vec![b"ttl:x0".to_vec()]);
    }

    #[test]
    fn test_tag_sequence_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = Storage::open(temp_dir.path()).unwrap();
            let id = storage.next_tag_id();
            assert_eq!(id, 1);
            let mut txn = storage.begin();
            txn.put(CF_TAGS, &TagKey::new(id).to_bytes(), b"{}").unwrap();
            txn.commit().unwrap();
        }

        let storage = Storage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.next_tag_id(), 2);
    }

    #[test]
    fn test_article_ids_are_monotonic() {
        let (storage, _temp) = create_test_storage();
        let a = storage.next_article_id();
        let b = storage.next_article_id();
        assert!(a < b);
    }

    #[test]
    fn test_sample_values_is_bounded_and_covers_all() {
        let (storage, _temp) = create_test_storage();
        let mut txn = storage.begin();
        for i in 0..10u8 {
            txn.put(CF_AUTHORS, &[b'k', i], &[i]).unwrap();
        }
        txn.commit().unwrap();

        let mut picked = HashSet::new();
        for _ in 0..200 {
            let sample = storage.sample_values(CF_AUTHORS, 3).unwrap();
            assert_eq!(sample.len(), 3);
            let distinct: HashSet<_> = sample.iter().collect();
            assert_eq!(distinct.len(), 3);
            picked.extend(sample);
        }
        assert_eq!(picked.len(), 10);

        assert_eq!(storage.sample_values(CF_AUTHORS, 50).unwrap().len(), 10);
        assert!(storage.sample_values(CF_AUTHORS, 0).unwrap().is_empty());
    }

    #[test]
    fn test_stats_empty() {
        let (storage, _temp) = create_test_storage();
        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.article_count, 0);
        assert_eq!(stats.tag_count, 0);
        assert_eq!(stats.relation_count, 0);
    }
}
