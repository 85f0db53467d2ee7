//! OpenDesk Rate Limiting
//!
//! Durable token-bucket admission control for write endpoints.
//!
//! ## Features
//! - Per-actor, per-action buckets keyed `identifier + "_" + action`
//! - Whole-window refill arithmetic with no drift
//! - Atomic read-refill-consume-write via compare-and-swap on the store
//! - Explicit guard middleware composed around the protected operation

pub mod bucket;
pub mod guard;
pub mod limiter;
pub mod store;

pub use bucket::RateLimitBucket;
pub use guard::{rate_limited, Actor, RateLimitConfig};
pub use limiter::{RateLimitDecision, RateLimiter};
pub use store::{BucketStore, InMemoryBucketStore, VersionedBucket};

use desk_common::StoreError;
use thiserror::Error;

/// Rate limiting error type.
///
/// `Exceeded` is the expected, user-facing denial; `Store` is an
/// infrastructure failure and must never be conflated with a denial.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Request denied by admission control
    #[error("rate limit exceeded: maximum {max_requests} requests per {window_seconds} seconds allowed")]
    Exceeded {
        max_requests: u32,
        window_seconds: u32,
        /// Coarse retry hint, equal to the full window
        retry_after_seconds: u32,
    },

    /// Bucket store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for rate limiting
pub type RateLimitResult<T> = Result<T, RateLimitError>;
