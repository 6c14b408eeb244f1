//! Capability decorator that applies the rate limiter.

use super::limiter::RateLimiter;
use crate::ports::capability::{Capability, CapabilityError, StreamHandle};
use async_trait::async_trait;
use council_domain::{GenerationRequest, RateLimitKey};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Wraps a capability so every call takes a token first.
///
/// A provider rejection is recorded on the bucket and the call is retried
/// up to `max_retries` times with `retry_delay * 2^attempt` backoff. When
/// retries run out, or no token arrives within `max_wait`, the call ends
/// with [`CapabilityError::RateLimited`].
pub struct RateLimitedCapability<C: Capability> {
    inner: C,
    limiter: Arc<RateLimiter>,
}

impl<C: Capability> RateLimitedCapability<C> {
    pub fn new(inner: C, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn call_with_retries<T, F, Fut>(&self, key: RateLimitKey, call: F) -> Result<T, CapabilityError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<T, CapabilityError>> + Send,
        T: Send,
    {
        let max_retries = self.limiter.params().max_retries;
        let mut attempt = 0;
        loop {
            self.limiter
                .acquire(&key)
                .await
                .map_err(|e| {
                    warn!("{}", e);
                    CapabilityError::RateLimited { retry_after: None }
                })?;

            match call().await {
                Err(CapabilityError::RateLimited { retry_after }) => {
                    self.limiter.on_provider_rejection(&key, retry_after);
                    if attempt >= max_retries {
                        warn!(
                            "Provider kept rejecting {} after {} retries",
                            key, max_retries
                        );
                        return Err(CapabilityError::RateLimited { retry_after });
                    }
                    let delay = self.limiter.params().retry_backoff(attempt);
                    warn!(
                        "Provider rejected {} (attempt {}/{}), retrying in {:?}",
                        key,
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<C: Capability> Capability for RateLimitedCapability<C> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        let key = RateLimitKey::from(&request.endpoint);
        self.call_with_retries(key, || self.inner.generate(request))
            .await
    }

    async fn generate_streaming(
        &self,
        request: &GenerationRequest,
    ) -> Result<StreamHandle, CapabilityError> {
        let key = RateLimitKey::from(&request.endpoint);
        self.call_with_retries(key, || self.inner.generate_streaming(request))
            .await
    }

    /// Health checks bypass the limiter.
    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}
