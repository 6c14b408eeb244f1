//! Persisted token-bucket limiter.

use crate::config::RateLimitParams;
use crate::ports::bucket_store::BucketStore;
use crate::ports::clock::{Clock, SystemClock};
use council_domain::{RateLimitKey, TokenBucket};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shortest sleep between acquisition attempts.
const MIN_SLEEP: Duration = Duration::from_millis(1);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateLimitError {
    #[error("Rate limited: no token for {key} within {max_wait:?} (next in {next_in:?})")]
    WaitExceeded {
        key: RateLimitKey,
        max_wait: Duration,
        next_in: Duration,
    },
}

/// Proof that a token was taken.
#[derive(Debug, Clone)]
pub struct Permit {
    pub key: RateLimitKey,
    /// Time spent blocked before the token was granted.
    pub waited: Duration,
}

/// Token-bucket limiter keyed by (provider, model).
///
/// Each key has its own lock; it is held only for the synchronous bucket
/// update and the write-through save, never across an await.
pub struct RateLimiter {
    params: RateLimitParams,
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<RateLimitKey, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    pub fn new(params: RateLimitParams, store: Arc<dyn BucketStore>) -> Self {
        Self {
            params,
            store,
            clock: Arc::new(SystemClock::new()),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn params(&self) -> &RateLimitParams {
        &self.params
    }

    /// Block until a token for `key` is available, at most `max_wait`.
    pub async fn acquire(&self, key: &RateLimitKey) -> Result<Permit, RateLimitError> {
        let started = Instant::now();
        let entry = self.entry(key);
        loop {
            let next_in = {
                let mut bucket = lock(&entry);
                match bucket.try_acquire(self.clock.now()) {
                    Ok(()) => {
                        self.persist(key, &bucket);
                        let waited = started.elapsed();
                        if !waited.is_zero() {
                            debug!("Acquired token for {} after {:?}", key, waited);
                        }
                        return Ok(Permit {
                            key: key.clone(),
                            waited,
                        });
                    }
                    Err(next_in) => next_in,
                }
            };

            let waited = started.elapsed();
            if waited + next_in > self.params.max_wait {
                warn!(
                    "Rate limit wait for {} exceeds {:?} (waited {:?}, next token in {:?})",
                    key, self.params.max_wait, waited, next_in
                );
                return Err(RateLimitError::WaitExceeded {
                    key: key.clone(),
                    max_wait: self.params.max_wait,
                    next_in,
                });
            }

            debug!("No token for {}, sleeping {:?}", key, next_in);
            tokio::time::sleep(next_in.max(MIN_SLEEP)).await;
        }
    }

    /// Record a provider-signaled limit. Without a hint the configured
    /// retry delay is used as the cooldown.
    pub fn on_provider_rejection(&self, key: &RateLimitKey, retry_after: Option<Duration>) {
        let cooldown = retry_after.unwrap_or(self.params.retry_delay);
        let entry = self.entry(key);
        let mut bucket = lock(&entry);
        bucket.reject(self.clock.now(), cooldown);
        self.persist(key, &bucket);
        info!("Provider rejected {}; cooling down for {:?}", key, cooldown);
    }

    /// Current state of a bucket (loading it if needed).
    pub fn snapshot(&self, key: &RateLimitKey) -> TokenBucket {
        lock(&self.entry(key)).clone()
    }

    /// Tokens available for `key` right now.
    pub fn available(&self, key: &RateLimitKey) -> f64 {
        lock(&self.entry(key)).available(self.clock.now())
    }

    fn entry(&self, key: &RateLimitKey) -> Arc<Mutex<TokenBucket>> {
        let mut buckets = lock(&self.buckets);
        if let Some(entry) = buckets.get(key) {
            return entry.clone();
        }
        let capacity = self.params.capacity_for(key);
        let bucket = match self.store.load(key) {
            Ok(Some(mut bucket)) => {
                debug!("Restored bucket {} ({:.2} tokens)", key, bucket.tokens());
                bucket.set_capacity(capacity);
                bucket
            }
            Ok(None) => TokenBucket::full(capacity, self.clock.now()),
            Err(e) => {
                warn!("Failed to load bucket {}: {}; starting full", key, e);
                TokenBucket::full(capacity, self.clock.now())
            }
        };
        let entry = Arc::new(Mutex::new(bucket));
        buckets.insert(key.clone(), entry.clone());
        entry
    }

    fn persist(&self, key: &RateLimitKey, bucket: &TokenBucket) {
        if let Err(e) = self.store.save(key, bucket) {
            warn!("Failed to persist bucket {}: {}", key, e);
        }
    }
}

/// Lock, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::bucket_store::{BucketStoreError, InMemoryBucketStore};

    fn key() -> RateLimitKey {
        RateLimitKey::new("openrouter", "meta-llama/llama-3.1-8b-instruct")
    }

    fn limiter(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>) -> RateLimiter {
        RateLimiter::new(RateLimitParams::default(), store).with_clock(clock)
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_16_twenty_rapid_acquires() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let limiter = Arc::new(limiter(Arc::new(InMemoryBucketStore::new()), clock));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.acquire(&key()).await }));
        }

        let mut immediate = 0;
        let mut blocked = 0;
        for handle in handles {
            let permit = handle.await.unwrap().expect("no acquire should fail");
            if permit.waited.is_zero() {
                immediate += 1;
            } else {
                assert!(permit.waited >= Duration::from_millis(3750));
                blocked += 1;
            }
        }
        assert_eq!(immediate, 16);
        assert_eq!(blocked, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resumes_persisted_budget() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let store = Arc::new(InMemoryBucketStore::new());
        let params = RateLimitParams::default()
            .with_requests_per_minute(4)
            .with_max_wait(Duration::from_secs(1));

        let first = RateLimiter::new(params.clone(), store.clone()).with_clock(clock.clone());
        for _ in 0..4 {
            first.acquire(&key()).await.unwrap();
        }
        let before = first.snapshot(&key());
        drop(first);

        let restarted = RateLimiter::new(params.clone(), store.clone()).with_clock(clock.clone());
        assert_eq!(restarted.snapshot(&key()), before);
        let err = restarted.acquire(&key()).await.unwrap_err();
        assert!(matches!(err, RateLimitError::WaitExceeded { .. }));

        // a fresh store would have granted immediately
        let fresh = RateLimiter::new(params, Arc::new(InMemoryBucketStore::new())).with_clock(clock);
        assert!(fresh.acquire(&key()).await.unwrap().waited.is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn provider_rejection_blocks_until_reset() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let limiter = limiter(Arc::new(InMemoryBucketStore::new()), clock);

        limiter.on_provider_rejection(&key(), Some(Duration::from_secs(20)));
        assert_eq!(limiter.available(&key()), 0.0);

        let permit = limiter.acquire(&key()).await.unwrap();
        assert!(permit.waited >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_without_hint_uses_retry_delay() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let limiter = limiter(Arc::new(InMemoryBucketStore::new()), clock.clone());
        let now = clock.now();
        limiter.on_provider_rejection(&key(), None);
        let reset = limiter.snapshot(&key()).reset_at().unwrap();
        assert_eq!((reset - now).num_seconds(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_beyond_max_fails_fast() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let limiter = limiter(Arc::new(InMemoryBucketStore::new()), clock);
        limiter.on_provider_rejection(&key(), Some(Duration::from_secs(600)));

        let started = Instant::now();
        let err = limiter.acquire(&key()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(err, RateLimitError::WaitExceeded { .. }));
    }

    struct BrokenStore;

    impl BucketStore for BrokenStore {
        fn load(&self, _key: &RateLimitKey) -> Result<Option<TokenBucket>, BucketStoreError> {
            Err(BucketStoreError::Backend("disk on fire".into()))
        }

        fn save(&self, _key: &RateLimitKey, _bucket: &TokenBucket) -> Result<(), BucketStoreError> {
            Err(BucketStoreError::Backend("disk on fire".into()))
        }

        fn list(&self) -> Result<Vec<(RateLimitKey, TokenBucket)>, BucketStoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn store_failures_do_not_block_callers() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let limiter = limiter(Arc::new(BrokenStore), clock);
        let permit = limiter.acquire(&key()).await.unwrap();
        assert!(permit.waited.is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn override_capacity_applies() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let params = RateLimitParams::default().with_override("ollama", 2);
        let limiter = RateLimiter::new(params, Arc::new(InMemoryBucketStore::new())).with_clock(clock);
        let local = RateLimitKey::new("ollama", "llama3.1");
        assert_eq!(limiter.snapshot(&local).capacity(), 2);
        assert_eq!(limiter.snapshot(&key()).capacity(), 16);
    }
}
