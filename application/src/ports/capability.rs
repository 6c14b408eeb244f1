//! Capability port
//!
//! Defines the interface to text-generation backends. The coordinator is
//! agnostic to which backend (local or cloud) serves a call.

use async_trait::async_trait;
use council_domain::{GenerationRequest, StreamEvent};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors a capability call can end with.
///
/// The variant decides what the caller does next:
/// - `Transient`: retry with backoff inside the unit
/// - `Persistent`: count toward removing the specialist
/// - `RateLimited`: back off per the rate-limit policy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Persistent error: {0}")]
    Persistent(String),

    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {:.1}s)", d.as_secs_f64()),
        None => String::new(),
    }
}

impl CapabilityError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CapabilityError::Transient(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CapabilityError::RateLimited { .. })
    }
}

/// Text generation backend.
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Generate a complete response.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError>;

    /// Generate a streaming response.
    ///
    /// Default implementation calls `generate()` and wraps the result in a
    /// single `Completed` event.
    async fn generate_streaming(
        &self,
        request: &GenerationRequest,
    ) -> Result<StreamHandle, CapabilityError> {
        let result = self.generate(request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Completed(result)).await;
        Ok(StreamHandle::new(rx))
    }

    /// Whether the backend answers at all.
    async fn health_check(&self) -> bool;
}

#[async_trait]
impl<C: Capability + ?Sized> Capability for Arc<C> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        (**self).generate(request).await
    }

    async fn generate_streaming(
        &self,
        request: &GenerationRequest,
    ) -> Result<StreamHandle, CapabilityError> {
        (**self).generate_streaming(request).await
    }

    async fn health_check(&self) -> bool {
        (**self).health_check().await
    }
}

/// Handle for receiving streaming events from a capability.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, CapabilityError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => return Err(CapabilityError::Transient(e)),
            }
        }
        // Channel closed without Completed - return what we have
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{CapabilityEndpoint, ProviderKind};

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
            Ok(request.prompt.to_uppercase())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(
            CapabilityEndpoint::new(ProviderKind::Ollama, "llama3.1").unwrap(),
            prompt,
        )
    }

    #[tokio::test]
    async fn default_streaming_wraps_generate() {
        let handle = Echo.generate_streaming(&request("hi")).await.unwrap();
        assert_eq!(handle.collect_text().await.unwrap(), "HI");
    }

    #[tokio::test]
    async fn collect_text_joins_deltas() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::Delta("a".into())).await.unwrap();
        tx.send(StreamEvent::Delta("b".into())).await.unwrap();
        tx.send(StreamEvent::Completed("ignored".into())).await.unwrap();
        assert_eq!(StreamHandle::new(rx).collect_text().await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn stream_error_is_transient() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(StreamEvent::Error("reset".into())).await.unwrap();
        let err = StreamHandle::new(rx).collect_text().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn arc_forwards() {
        let shared: Arc<dyn Capability> = Arc::new(Echo);
        assert!(shared.health_check().await);
        assert_eq!(shared.generate(&request("x")).await.unwrap(), "X");
    }

    #[test]
    fn rate_limited_display_includes_hint() {
        let err = CapabilityError::RateLimited {
            retry_after: Some(Duration::from_millis(2500)),
        };
        assert_eq!(err.to_string(), "Rate limited (retry after 2.5s)");
        assert_eq!(
            CapabilityError::RateLimited { retry_after: None }.to_string(),
            "Rate limited"
        );
    }
}
