//! Storage layer for taghub.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation per entity type
//! - Serialized write transactions spanning every store
//! - Ordered keys so relation listings come out newest first
//!
//! Stores ([`ArticleStore`], [`TagIndex`], [`RelationStore`], [`AuthorStore`])
//! each own one entity type. Writes take a [`Txn`] opened with
//! [`Storage::begin`], so one logical operation can touch several stores and
//! still commit or roll back as a unit.

pub mod articles;
pub mod authors;
pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod relations;
pub mod tags;

pub use articles::{ArticleStore, Comparison};
pub use authors::AuthorStore;
pub use db::{Storage, StorageStats, Txn};
pub use error::StorageError;
pub use relations::{Page, RelationStore};
pub use tags::TagIndex;
