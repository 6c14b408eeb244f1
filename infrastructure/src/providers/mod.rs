//! Capability adapters for local and cloud text-generation backends

mod error;
pub mod ollama;
pub mod openrouter;
pub mod routing;

pub use error::ProviderError;
pub use ollama::OllamaCapability;
pub use openrouter::OpenRouterCapability;
pub use routing::RoutingCapability;
