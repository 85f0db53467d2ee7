//! Bucket store
//!
//! Persistence seam for bucket rows. The store must support a conditional
//! write keyed on a version so the limiter's read-refill-consume-write
//! sequence can run as an optimistic compare-and-swap.

use crate::RateLimitBucket;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use desk_common::StoreResult;

/// A bucket row together with its optimistic-concurrency version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedBucket {
    pub bucket: RateLimitBucket,
    pub version: u64,
}

/// Durable mapping from bucket key to bucket state
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Fetch a bucket row
    async fn get(&self, bucket_key: &str) -> StoreResult<Option<VersionedBucket>>;

    /// Insert a new bucket. Returns false when the key already exists
    /// (a concurrent request won the creation race).
    async fn insert(&self, bucket: RateLimitBucket) -> StoreResult<bool>;

    /// Conditional write: replaces the row only if its version still
    /// equals `expected_version`. Returns false on mismatch.
    async fn compare_and_put(
        &self,
        bucket: RateLimitBucket,
        expected_version: u64,
    ) -> StoreResult<bool>;
}

/// In-memory bucket store for tests and single-process deployments.
///
/// Each compare-and-swap runs under the map's shard lock, so a single
/// conditional write is atomic.
#[derive(Default)]
pub struct InMemoryBucketStore {
    buckets: DashMap<String, VersionedBucket>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn get(&self, bucket_key: &str) -> StoreResult<Option<VersionedBucket>> {
        Ok(self.buckets.get(bucket_key).map(|row| row.value().clone()))
    }

    async fn insert(&self, bucket: RateLimitBucket) -> StoreResult<bool> {
        match self.buckets.entry(bucket.bucket_key.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(VersionedBucket { bucket, version: 1 });
                Ok(true)
            }
        }
    }

    async fn compare_and_put(
        &self,
        bucket: RateLimitBucket,
        expected_version: u64,
    ) -> StoreResult<bool> {
        match self.buckets.entry(bucket.bucket_key.clone()) {
            Entry::Occupied(mut slot) => {
                let row = slot.get_mut();
                if row.version != expected_version {
                    return Ok(false);
                }
                row.bucket = bucket;
                row.version += 1;
                Ok(true)
            }
            // Row pruned underneath us; let the caller reload
            Entry::Vacant(_) => Ok(false),
        }
    }
}
