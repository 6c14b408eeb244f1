//! Generation request value object.

use super::endpoint::CapabilityEndpoint;
use serde::{Deserialize, Serialize};

/// Sampling temperature used when the caller does not choose one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single prompt to send to a capability endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub endpoint: CapabilityEndpoint,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(endpoint: CapabilityEndpoint, prompt: impl Into<String>) -> Self {
        Self {
            endpoint,
            system_prompt: None,
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::endpoint::ProviderKind;

    #[test]
    fn builder_sets_fields() {
        let ep = CapabilityEndpoint::new(ProviderKind::Ollama, "llama3.1").unwrap();
        let req = GenerationRequest::new(ep.clone(), "hello")
            .with_system_prompt("be brief")
            .with_temperature(0.2)
            .with_max_tokens(256);
        assert_eq!(req.endpoint, ep);
        assert_eq!(req.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(req.temperature, 0.2);
        assert_eq!(req.max_tokens, Some(256));
    }
}
