//! Rate limit parameters.

use council_domain::RateLimitKey;
use std::collections::BTreeMap;
use std::time::Duration;

/// Bucket sizing and provider retry policy.
#[derive(Debug, Clone)]
pub struct RateLimitParams {
    /// Default bucket capacity.
    pub requests_per_minute: u32,
    /// Capacity overrides keyed by `provider` or `provider/model`.
    pub overrides: BTreeMap<String, u32>,
    /// Retries after a provider rejection.
    pub max_retries: u32,
    /// Base delay between rejection retries (doubled per attempt). Also the
    /// cooldown used when a provider rejects without a retry-after hint.
    pub retry_delay: Duration,
    /// Longest a caller blocks in `acquire` before getting `RateLimited`.
    pub max_wait: Duration,
}

impl Default for RateLimitParams {
    fn default() -> Self {
        Self {
            requests_per_minute: 16,
            overrides: BTreeMap::new(),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            max_wait: Duration::from_secs(90),
        }
    }
}

impl RateLimitParams {
    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = rpm.max(1);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, rpm: u32) -> Self {
        self.overrides.insert(key.into(), rpm.max(1));
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Capacity for a key: `provider/model` override, then `provider`, then default.
    pub fn capacity_for(&self, key: &RateLimitKey) -> u32 {
        self.overrides
            .get(&key.to_string())
            .or_else(|| self.overrides.get(&key.provider))
            .copied()
            .unwrap_or(self.requests_per_minute)
            .max(1)
    }

    /// Backoff before rejection retry number `attempt` (0-based).
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}
