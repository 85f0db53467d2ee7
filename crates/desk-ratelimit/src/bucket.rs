//! Token bucket state
//!
//! Bucket rows are durable, so all timing uses wall-clock timestamps
//! rather than process-local instants. Refill advances `last_refill_at`
//! by whole window multiples, never snapping to `now` - partial windows
//! stay credited to the next refill.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One rate-limit counter: the admission budget for a single
/// (identifier, action) pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitBucket {
    /// Opaque actor key, e.g. "user_<id>" or "company_<id>"
    pub identifier: String,
    /// Storage primary key: `identifier + "_" + action`
    pub bucket_key: String,
    pub tokens_remaining: u32,
    pub max_tokens: u32,
    /// Tokens restored per elapsed window; equals `max_tokens` in this
    /// design (full refill per window)
    pub refill_rate: u32,
    /// Immutable after creation
    pub window_duration_seconds: u32,
    /// Advances only by whole multiples of the window
    pub last_refill_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RateLimitBucket {
    /// Compose the storage key for an (identifier, action) pair
    pub fn key_for(identifier: &str, action: &str) -> String {
        format!("{identifier}_{action}")
    }

    /// Create a full bucket, as done lazily on first sight of a key
    pub fn new(
        identifier: impl Into<String>,
        action: &str,
        max_requests: u32,
        window_seconds: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let identifier = identifier.into();
        let bucket_key = Self::key_for(&identifier, action);
        Self {
            identifier,
            bucket_key,
            tokens_remaining: max_requests,
            max_tokens: max_requests,
            refill_rate: max_requests,
            window_duration_seconds: window_seconds,
            last_refill_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Restore tokens for every whole window elapsed since the last
    /// refill. Idempotent for a fixed `now`.
    pub fn refill(&mut self, now: DateTime<Utc>) {
        let window = i64::from(self.window_duration_seconds);
        if window <= 0 {
            return;
        }

        let elapsed = (now - self.last_refill_at).num_seconds();
        if elapsed < window {
            return;
        }

        let windows_passed = elapsed / window;
        let restored = (windows_passed as u64).saturating_mul(u64::from(self.refill_rate));
        self.tokens_remaining = (u64::from(self.tokens_remaining) + restored)
            .min(u64::from(self.max_tokens)) as u32;
        self.last_refill_at += Duration::seconds(windows_passed * window);
    }

    /// Refill, then consume one token. Returns whether the request is
    /// admitted. The bucket is mutated either way: a denial can still
    /// have advanced refill state, so callers persist unconditionally.
    pub fn consume(&mut self, now: DateTime<Utc>) -> bool {
        self.refill(now);
        self.updated_at = now;

        if self.tokens_remaining > 0 {
            self.tokens_remaining -= 1;
            true
        } else {
            false
        }
    }
}
