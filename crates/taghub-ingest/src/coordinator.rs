//! Ingestion coordinator.
//!
//! The only component that touches more than one store per operation.
//! Every add, update and remove runs inside one storage transaction:
//! article, tag counts, relations and the author record commit together
//! or not at all. Rate-limit bookkeeping and relay events happen only
//! after a successful commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use taghub_storage::{ArticleStore, AuthorStore, RelationStore, Storage, TagIndex, Txn};
use taghub_types::{Article, ArticleDraft, ArticleEvent, AuthorRecord, IngestSettings};

use crate::error::IngestError;
use crate::normalize::{normalize_source_host, normalize_tags, resolve_permalink, TagRules};
use crate::rate_limit::RateLimiter;
use crate::relay::EventPublisher;
use crate::sanitize::Sanitizer;

/// Raw article fields as received from a member blog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleInput {
    pub original_id: String,
    pub title: String,
    /// Absolute URL, or a path relative to `source_host`
    pub permalink: String,
    /// Free-text tag list
    pub tags: String,
    pub author_email: String,
    pub source_host: String,
    pub source_title: String,
    pub source_version: String,
    pub source_name: String,
    /// When false the change is stored but not relayed downstream
    pub post_to_community: bool,
}

/// Result of an add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub article_id: String,
    /// False when the original id was already stored and nothing changed
    pub created: bool,
}

/// Orchestrates article ingestion across the stores.
pub struct IngestionCoordinator {
    storage: Arc<Storage>,
    articles: ArticleStore,
    tags: TagIndex,
    relations: RelationStore,
    authors: AuthorStore,
    limiter: Arc<RateLimiter>,
    sanitizer: Arc<dyn Sanitizer>,
    publisher: Arc<dyn EventPublisher>,
    settings: IngestSettings,
    tag_rules: TagRules,
}

impl IngestionCoordinator {
    pub fn new(
        storage: Arc<Storage>,
        limiter: Arc<RateLimiter>,
        sanitizer: Arc<dyn Sanitizer>,
        publisher: Arc<dyn EventPublisher>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            articles: ArticleStore::new(storage.clone()),
            tags: TagIndex::new(storage.clone()),
            relations: RelationStore::new(storage.clone()),
            authors: AuthorStore::new(storage.clone()),
            storage,
            limiter,
            sanitizer,
            publisher,
            tag_rules: TagRules::from(&settings),
            settings,
        }
    }

    pub fn articles(&self) -> &ArticleStore {
        &self.articles
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn relations(&self) -> &RelationStore {
        &self.relations
    }

    pub fn authors(&self) -> &AuthorStore {
        &self.authors
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Store a new article and index its tags.
    ///
    /// Re-adding a known original id is a no-op that returns the stored id
    /// with `created = false`.
    pub fn add_article(&self, input: ArticleInput, now: DateTime<Utc>) -> Result<AddOutcome, IngestError> {
        self.check_rate_limit(&input.author_email, now)?;
        let draft = self.validate(&input)?;

        let mut txn = self.storage.begin();
        if let Some(existing) = self.articles.get_by_original_id_in(&txn, &draft.original_id)? {
            debug!(article_id = %existing.id, original_id = %draft.original_id, "Article already stored");
            return Ok(AddOutcome {
                article_id: existing.id,
                created: false,
            });
        }

        let article = self.articles.insert(&mut txn, draft)?;
        self.link_tags(&mut txn, &article)?;
        self.upsert_author(&mut txn, &article, now)?;
        txn.commit()?;

        self.limiter.record(&article.author_email, now);
        info!(
            article_id = %article.id,
            original_id = %article.original_id,
            host = %article.source_host,
            tags = article.tag_titles.len(),
            "Article added"
        );

        let article_id = article.id.clone();
        if input.post_to_community {
            self.publisher.publish(ArticleEvent::added(article));
        }
        Ok(AddOutcome {
            article_id,
            created: true,
        })
    }

    /// Replace an article's content and tags, keyed by original id.
    ///
    /// Probe counters are preserved. Returns the article id.
    pub fn update_article(&self, input: ArticleInput, now: DateTime<Utc>) -> Result<String, IngestError> {
        self.check_rate_limit(&input.author_email, now)?;
        let draft = self.validate(&input)?;

        let mut txn = self.storage.begin();
        if self
            .articles
            .get_by_original_id_in(&txn, &draft.original_id)?
            .is_none()
        {
            return Err(IngestError::NotFound(format!(
                "article with original id {}",
                draft.original_id
            )));
        }

        let original_id = draft.original_id.clone();
        let article = self
            .articles
            .update_by_original_id(&mut txn, &original_id, draft)?;
        self.unlink_tags(&mut txn, &article.id)?;
        self.link_tags(&mut txn, &article)?;
        self.upsert_author(&mut txn, &article, now)?;
        txn.commit()?;

        self.limiter.record(&article.author_email, now);
        info!(article_id = %article.id, original_id = %article.original_id, "Article updated");

        let article_id = article.id.clone();
        if input.post_to_community {
            self.publisher.publish(ArticleEvent::updated(article));
        }
        Ok(article_id)
    }

    /// Remove an article, its relations and its tag references.
    pub fn remove_article(&self, article_id: &str) -> Result<Article, IngestError> {
        let mut txn = self.storage.begin();
        if self.articles.get_in(&txn, article_id)?.is_none() {
            return Err(IngestError::NotFound(format!("article {}", article_id)));
        }

        self.unlink_tags(&mut txn, article_id)?;
        let removed = self
            .articles
            .remove(&mut txn, article_id)?
            .ok_or_else(|| IngestError::NotFound(format!("article {}", article_id)))?;
        txn.commit()?;

        info!(article_id = %removed.id, permalink = %removed.permalink, "Article removed");
        Ok(removed)
    }

    fn check_rate_limit(&self, author_email: &str, now: DateTime<Utc>) -> Result<(), IngestError> {
        if let Some(wait) = self.limiter.retry_after(author_email, now) {
            debug!(author = %author_email, retry_after_ms = wait.as_millis() as u64, "Post rate limited");
            return Err(IngestError::RateLimited {
                retry_after_ms: wait.as_millis() as u64,
            });
        }
        Ok(())
    }

    fn link_tags(&self, txn: &mut Txn<'_>, article: &Article) -> Result<(), IngestError> {
        for title in &article.tag_titles {
            let tag = self.tags.resolve_and_bump(txn, title)?;
            self.relations.add(txn, tag.id, &article.id)?;
        }
        Ok(())
    }

    fn unlink_tags(&self, txn: &mut Txn<'_>, article_id: &str) -> Result<(), IngestError> {
        for tag_id in self.relations.remove_all_for_article(txn, article_id)? {
            self.tags.decrement(txn, tag_id)?;
        }
        Ok(())
    }

    fn upsert_author(&self, txn: &mut Txn<'_>, article: &Article, now: DateTime<Utc>) -> Result<(), IngestError> {
        let record = AuthorRecord {
            email: article.author_email.clone(),
            source_url: article.source_host.clone(),
            last_post_at: now,
        };
        self.authors.upsert(txn, &record)?;
        Ok(())
    }

    /// Check and normalize every field. Nothing is written.
    fn validate(&self, input: &ArticleInput) -> Result<ArticleDraft, IngestError> {
        let settings = &self.settings;

        if !settings.allowed_sources.is_empty()
            && !settings.allowed_sources.iter().any(|s| s == &input.source_name)
        {
            warn!(source = %input.source_name, host = %input.source_host, "Unsupported client");
            return Err(IngestError::invalid("source_name", "unsupported client"));
        }
        if !settings.allowed_versions.is_empty()
            && !settings.allowed_versions.iter().any(|v| v == &input.source_version)
        {
            warn!(version = %input.source_version, host = %input.source_host, "Unsupported client version");
            return Err(IngestError::invalid("source_version", "unsupported version"));
        }

        let original_id = input.original_id.trim();
        if original_id.is_empty() {
            return Err(IngestError::invalid("original_id", "must not be empty"));
        }
        if original_id.chars().count() > settings.max_original_id_len {
            return Err(IngestError::invalid(
                "original_id",
                format!("longer than {} characters", settings.max_original_id_len),
            ));
        }

        let author_email = input.author_email.trim().to_lowercase();
        if author_email.is_empty() || !author_email.contains('@') {
            return Err(IngestError::invalid("author_email", "not an email address"));
        }

        let source_host = normalize_source_host(&input.source_host)
            .map_err(|reason| IngestError::invalid("source_host", reason))?;
        let permalink = resolve_permalink(&source_host, &input.permalink)
            .map_err(|reason| IngestError::invalid("permalink", reason))?;

        let title = self.bounded_text("title", &input.title)?;
        let source_title = self.bounded_text("source_title", &input.source_title)?;

        let tag_titles = normalize_tags(&input.tags, &self.tag_rules);
        if tag_titles.is_empty() {
            return Err(IngestError::invalid("tags", "no usable tags"));
        }

        Ok(ArticleDraft {
            original_id: original_id.to_string(),
            title,
            permalink,
            tag_titles,
            author_email,
            source_host,
            source_title,
            source_version: input.source_version.trim().to_string(),
            source_name: input.source_name.trim().to_string(),
        })
    }

    fn bounded_text(&self, field: &'static str, raw: &str) -> Result<String, IngestError> {
        let text = self.sanitizer.sanitize(raw);
        if text.is_empty() {
            return Err(IngestError::invalid(field, "must not be empty"));
        }
        if text.chars().count() > self.settings.max_title_len {
            return Err(IngestError::invalid(
                field,
                format!("longer than {} characters", self.settings.max_title_len),
            ));
        }
        Ok(text)
    }
}
