//! Article ingestion for taghub.
//!
//! - [`RateLimiter`]: one post per author per interval
//! - [`IngestionCoordinator`]: validated add/update/remove across the stores
//! - [`ArticleQuery`]: tag-based discovery and tag popularity
//! - [`EventPublisher`]: non-blocking relay of committed changes
//! - [`Sanitizer`]: seam for the external text sanitizer

pub mod coordinator;
pub mod error;
pub mod normalize;
pub mod query;
pub mod rate_limit;
pub mod relay;
pub mod sanitize;

pub use coordinator::{AddOutcome, ArticleInput, IngestionCoordinator};
pub use error::{IngestError, RelayError};
pub use normalize::{normalize_tags, TagRules};
pub use query::{ArticleQuery, ArticleSummary};
pub use rate_limit::RateLimiter;
pub use relay::{DisabledRelay, EventPublisher, HttpEventRelay, HttpRelayConfig, RelayStats};
pub use sanitize::{EscapeSanitizer, Sanitizer};

/// User-Agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("taghub/", env!("CARGO_PKG_VERSION"));
