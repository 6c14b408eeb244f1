use super::error::ProviderError;
use super::ollama::OllamaCapability;
use super::openrouter::OpenRouterCapability;
use crate::config::FileProvidersConfig;
use async_trait::async_trait;
use council_application::{Capability, CapabilityError, StreamHandle};
use council_domain::{GenerationRequest, ProviderKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dispatches each request to the adapter for its endpoint's provider.
#[derive(Default, Clone)]
pub struct RoutingCapability {
    routes: BTreeMap<ProviderKind, Arc<dyn Capability>>,
}

impl RoutingCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, provider: ProviderKind, capability: Arc<dyn Capability>) -> Self {
        self.routes.insert(provider, capability);
        self
    }

    /// Build every adapter the configuration allows.
    ///
    /// Ollama needs nothing but a host. OpenRouter is skipped when no API
    /// key resolves; requests for it then fail as persistent errors.
    pub fn from_config(config: &FileProvidersConfig) -> Result<Self, ProviderError> {
        let mut routing = Self::new().with_route(
            ProviderKind::Ollama,
            Arc::new(OllamaCapability::from_config(&config.ollama)?),
        );
        match OpenRouterCapability::from_config(&config.openrouter) {
            Ok(openrouter) => {
                routing = routing.with_route(ProviderKind::OpenRouter, Arc::new(openrouter));
            }
            Err(ProviderError::MissingApiKey { env_var, .. }) => {
                debug!("OpenRouter disabled: ${} is not set", env_var);
            }
            Err(e) => return Err(e),
        }
        Ok(routing)
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.routes.keys().copied()
    }

    /// Health of each configured provider.
    pub async fn health(&self) -> Vec<(ProviderKind, bool)> {
        let mut results = Vec::with_capacity(self.routes.len());
        for (provider, capability) in &self.routes {
            results.push((*provider, capability.health_check().await));
        }
        results
    }

    fn route(&self, request: &GenerationRequest) -> Result<&Arc<dyn Capability>, CapabilityError> {
        let provider = request.endpoint.provider();
        self.routes.get(&provider).ok_or_else(|| {
            warn!("No adapter configured for provider {}", provider);
            CapabilityError::Persistent(format!("no adapter configured for provider {}", provider))
        })
    }
}

#[async_trait]
impl Capability for RoutingCapability {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        self.route(request)?.generate(request).await
    }

    async fn generate_streaming(
        &self,
        request: &GenerationRequest,
    ) -> Result<StreamHandle, CapabilityError> {
        self.route(request)?.generate_streaming(request).await
    }

    async fn health_check(&self) -> bool {
        if self.routes.is_empty() {
            return false;
        }
        self.health().await.iter().all(|(_, healthy)| *healthy)
    }
}
