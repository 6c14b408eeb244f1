//! Bucket store port
//!
//! Write-through persistence for rate-limit buckets. Synchronous: the
//! limiter saves while holding the key's lock so writes land in order.

use council_domain::{RateLimitKey, TokenBucket};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BucketStoreError {
    #[error("Bucket store backend error: {0}")]
    Backend(String),

    #[error("Corrupt bucket record for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub trait BucketStore: Send + Sync {
    fn load(&self, key: &RateLimitKey) -> Result<Option<TokenBucket>, BucketStoreError>;

    fn save(&self, key: &RateLimitKey, bucket: &TokenBucket) -> Result<(), BucketStoreError>;

    /// Every persisted bucket, ordered by key.
    fn list(&self) -> Result<Vec<(RateLimitKey, TokenBucket)>, BucketStoreError>;
}

/// Process-local bucket store. State is lost on exit.
#[derive(Default)]
pub struct InMemoryBucketStore {
    buckets: Mutex<BTreeMap<RateLimitKey, TokenBucket>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<RateLimitKey, TokenBucket>>, BucketStoreError>
    {
        self.buckets
            .lock()
            .map_err(|e| BucketStoreError::Backend(format!("bucket store lock poisoned: {}", e)))
    }
}

impl BucketStore for InMemoryBucketStore {
    fn load(&self, key: &RateLimitKey) -> Result<Option<TokenBucket>, BucketStoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn save(&self, key: &RateLimitKey, bucket: &TokenBucket) -> Result<(), BucketStoreError> {
        self.lock()?.insert(key.clone(), bucket.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<(RateLimitKey, TokenBucket)>, BucketStoreError> {
        Ok(self
            .lock()?
            .iter()
            .map(|(k, b)| (k.clone(), b.clone()))
            .collect())
    }
}
