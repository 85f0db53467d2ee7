//! Rate limiter
//!
//! Couples refill and consumption decisions to the bucket store through an
//! optimistic compare-and-swap loop, so concurrent requests for the same
//! bucket key can never both spend the same token.

use crate::{BucketStore, RateLimitBucket};
use desk_common::{Clock, StoreError, StoreResult};
use std::sync::Arc;
use tracing::debug;

/// Attempts before concluding the store is pathologically contended
const MAX_CAS_ATTEMPTS: u32 = 8;

/// Outcome of one admission check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub tokens_remaining: u32,
    /// Zero when allowed; the full window when denied. The coarse hint is
    /// part of the inherited contract.
    pub retry_after_seconds: u32,
}

/// Token-bucket admission control over a [`BucketStore`]
pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Run one admission check for (identifier, action), creating the
    /// bucket full on first sight.
    ///
    /// The read-refill-consume-write sequence is atomic: the updated
    /// bucket is written back conditionally on the version observed at
    /// read time, and the whole sequence retries on conflict. The bucket
    /// is persisted even on denial, since refill may have advanced state.
    ///
    /// A store failure propagates as [`StoreError`]; it is never reported
    /// as an allow or a deny.
    pub async fn check_and_consume(
        &self,
        identifier: &str,
        action: &str,
        max_requests: u32,
        window_seconds: u32,
    ) -> StoreResult<RateLimitDecision> {
        let bucket_key = RateLimitBucket::key_for(identifier, action);

        for _ in 0..MAX_CAS_ATTEMPTS {
            let now = self.clock.now();

            let written = match self.store.get(&bucket_key).await? {
                None => {
                    let mut bucket = RateLimitBucket::new(
                        identifier,
                        action,
                        max_requests,
                        window_seconds,
                        now,
                    );
                    let allowed = bucket.consume(now);
                    let decision = decision_for(&bucket, allowed);
                    if self.store.insert(bucket).await? {
                        Some(decision)
                    } else {
                        // Lost the creation race; reload and go again
                        None
                    }
                }
                Some(row) => {
                    let mut bucket = row.bucket;
                    let allowed = bucket.consume(now);
                    let decision = decision_for(&bucket, allowed);
                    if self.store.compare_and_put(bucket, row.version).await? {
                        Some(decision)
                    } else {
                        None
                    }
                }
            };

            if let Some(decision) = written {
                debug!(
                    %bucket_key,
                    allowed = decision.allowed,
                    tokens_remaining = decision.tokens_remaining,
                    "rate limit check"
                );
                return Ok(decision);
            }
        }

        Err(StoreError::Conflict(format!(
            "bucket {bucket_key}: conditional write kept losing"
        )))
    }
}

fn decision_for(bucket: &RateLimitBucket, allowed: bool) -> RateLimitDecision {
    RateLimitDecision {
        allowed,
        tokens_remaining: bucket.tokens_remaining,
        retry_after_seconds: if allowed {
            0
        } else {
            bucket.window_duration_seconds
        },
    }
}
