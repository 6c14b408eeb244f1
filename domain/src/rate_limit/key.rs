//! Bucket key value object

use crate::generation::endpoint::CapabilityEndpoint;
use serde::{Deserialize, Serialize};

/// One bucket per (provider, model).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RateLimitKey {
    pub provider: String,
    pub model: String,
}

impl RateLimitKey {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl From<&CapabilityEndpoint> for RateLimitKey {
    fn from(endpoint: &CapabilityEndpoint) -> Self {
        Self::new(endpoint.provider().as_str(), endpoint.model())
    }
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_endpoint() {
        let ep: CapabilityEndpoint = "openrouter:meta-llama/llama-3.1-8b-instruct".parse().unwrap();
        let key = RateLimitKey::from(&ep);
        assert_eq!(key.provider, "openrouter");
        assert_eq!(key.model, "meta-llama/llama-3.1-8b-instruct");
        assert_eq!(key.to_string(), "openrouter/meta-llama/llama-3.1-8b-instruct");
    }
}
