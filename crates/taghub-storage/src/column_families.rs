//! Column family definitions for RocksDB.
//!
//! - articles: article records keyed by ULID
//! - article_original_ids: client id -> article id
//! - tags: tag records keyed by sequence id
//! - tag_titles: normalized title -> tag id
//! - tag_articles: tag -> article relations, newest article last
//! - article_tags: article -> tag relations, for removal
//! - authors: last-post records keyed by email

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for articles
pub const CF_ARTICLES: &str = "articles";

/// Column family name for the original id index
pub const CF_ARTICLE_ORIGINAL_IDS: &str = "article_original_ids";

/// Column family name for tags
pub const CF_TAGS: &str = "tags";

/// Column family name for the tag title index
pub const CF_TAG_TITLES: &str = "tag_titles";

/// Column family name for tag -> article relations
pub const CF_TAG_ARTICLES: &str = "tag_articles";

/// Column family name for article -> tag relations
pub const CF_ARTICLE_TAGS: &str = "article_tags";

/// Column family name for author records
pub const CF_AUTHORS: &str = "authors";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_ARTICLES,
    CF_ARTICLE_ORIGINAL_IDS,
    CF_TAGS,
    CF_TAG_TITLES,
    CF_TAG_ARTICLES,
    CF_ARTICLE_TAGS,
    CF_AUTHORS,
];

/// Articles are the bulk of the data; compress them.
fn articles_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    ALL_CF_NAMES
        .iter()
        .map(|name| {
            let opts = if *name == CF_ARTICLES {
                articles_options()
            } else {
                Options::default()
            };
            ColumnFamilyDescriptor::new(*name, opts)
        })
        .collect()
}
