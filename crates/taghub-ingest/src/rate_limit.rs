//! Per-author post throttling.
//!
//! An author may post once per `min_interval`. State lives in memory only;
//! losing it on restart just lets each author post once early.
//!
//! ## Thread Safety
//!
//! - Last-post times live in a `DashMap`, updated through the entry API
//! - `allow` never mutates; only a committed ingestion calls `record`

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Keyed last-post-time cache.
pub struct RateLimiter {
    min_interval: Duration,
    last_post: DashMap<String, DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_post: DashMap::new(),
        }
    }

    fn key(author: &str) -> String {
        author.trim().to_lowercase()
    }

    /// Remaining wait for `author`, or `None` if a post is allowed at `now`.
    pub fn retry_after(&self, author: &str, now: DateTime<Utc>) -> Option<Duration> {
        let last = *self.last_post.get(&Self::key(author))?;
        // A clock that went backwards counts as no time elapsed
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }

    /// Whether `author` may post at `now`. Does not change any state.
    pub fn allow(&self, author: &str, now: DateTime<Utc>) -> bool {
        self.retry_after(author, now).is_none()
    }

    /// Remember a successful post. Never moves an author's time backwards.
    pub fn record(&self, author: &str, now: DateTime<Utc>) {
        self.last_post
            .entry(Self::key(author))
            .and_modify(|last| {
                if now > *last {
                    *last = now;
                }
            })
            .or_insert(now);
    }

    /// Forget authors whose interval has fully elapsed. Returns how many were dropped.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.last_post.len();
        self.last_post.retain(|_, last| {
            (now - *last)
                .to_std()
                .map(|elapsed| elapsed < self.min_interval)
                .unwrap_or(true)
        });
        let pruned = before.saturating_sub(self.last_post.len());
        debug!(pruned, remaining = self.last_post.len(), "Pruned rate limiter");
        pruned
    }

    /// Number of tracked authors.
    pub fn len(&self) -> usize {
        self.last_post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_post.is_empty()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(60))
    }

    #[test]
    fn test_first_post_allowed() {
        assert!(limiter().allow("x@y.com", Utc::now()));
    }

    #[test]
    fn test_second_post_within_interval_denied() {
        let limiter = limiter();
        let now = Utc::now();
        limiter.record("x@y.com", now);

        assert!(!limiter.allow("x@y.com", now + TimeDelta::seconds(10)));
        assert_eq!(
            limiter.retry_after("x@y.com", now + TimeDelta::seconds(10)),
            Some(Duration::from_secs(50))
        );
        assert!(limiter.allow("x@y.com", now + TimeDelta::seconds(60)));
    }

    #[test]
    fn test_keys_ignore_case() {
        let limiter = limiter();
        let now = Utc::now();
        limiter.record("X@Y.com ", now);
        assert!(!limiter.allow("x@y.com", now));
    }

    #[test]
    fn test_allow_does_not_record() {
        let limiter = limiter();
        let now = Utc::now();
        assert!(limiter.allow("x@y.com", now));
        assert!(limiter.allow("x@y.com", now));
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_record_keeps_latest() {
        let limiter = limiter();
        let now = Utc::now();
        limiter.record("x@y.com", now);
        limiter.record("x@y.com", now - TimeDelta::seconds(120));
        assert!(!limiter.allow("x@y.com", now + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_clock_skew_denies() {
        let limiter = limiter();
        let now = Utc::now();
        limiter.record("x@y.com", now);
        assert!(!limiter.allow("x@y.com", now - TimeDelta::seconds(5)));
    }

    #[test]
    fn test_prune_drops_expired() {
        let limiter = limiter();
        let now = Utc::now();
        limiter.record("old@y.com", now - TimeDelta::seconds(120));
        limiter.record("new@y.com", now - TimeDelta::seconds(5));

        assert_eq!(limiter.prune(now), 1);
        assert_eq!(limiter.len(), 1);
        assert!(!limiter.allow("new@y.com", now));
    }
}
