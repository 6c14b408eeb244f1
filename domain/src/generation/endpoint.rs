//! Capability endpoints: a provider plus a model name.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Backend family that serves generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    Ollama,
    /// OpenRouter cloud API
    OpenRouter,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenRouter => "openrouter",
        }
    }

    /// Whether the provider runs on the local machine.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            "openrouter" | "cloud" => Ok(ProviderKind::OpenRouter),
            other => Err(DomainError::InvalidEndpoint(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

/// A provider and model pair (Value Object).
///
/// Written as `provider:model`. Only the first `:` separates the two, so
/// Ollama tags such as `ollama:llama3.1:8b` and OpenRouter slugs such as
/// `openrouter:meta-llama/llama-3.1-8b-instruct` both parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityEndpoint {
    provider: ProviderKind,
    model: String,
}

impl CapabilityEndpoint {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Result<Self, DomainError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(DomainError::InvalidEndpoint(
                "model name cannot be empty".into(),
            ));
        }
        Ok(Self { provider, model })
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Display for CapabilityEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl FromStr for CapabilityEndpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s.split_once(':').ok_or_else(|| {
            DomainError::InvalidEndpoint(format!("expected provider:model, got '{}'", s))
        })?;
        Self::new(provider.parse()?, model.trim())
    }
}
