//! # taghub-types
//!
//! Shared domain types for the taghub aggregation service.
//!
//! - Articles: records pushed by member blogs, plus their probe counters
//! - Tags: normalized titles with a reference count
//! - Authors: last-post bookkeeping per author email
//! - Events: notifications handed to the relay after a commit
//! - Settings: layered configuration for every component

pub mod article;
pub mod author;
pub mod config;
pub mod error;
pub mod event;
pub mod tag;

pub use article::{Article, ArticleDraft};
pub use author::AuthorRecord;
pub use config::{IngestSettings, JobSettings, ProbeSettings, RelaySettings, Settings};
pub use error::HubError;
pub use event::{ArticleEvent, ArticleEventKind};
pub use tag::Tag;
