//! Infrastructure layer for council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: SQLite task and bucket stores, HTTP
//! capability providers, the JSONL transcript logger, and
//! configuration file loading.

pub mod config;
pub mod logging;
pub mod providers;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use logging::JsonlConversationLogger;
pub use providers::{OllamaCapability, OpenRouterCapability, ProviderError, RoutingCapability};
pub use storage::{SqliteBucketStore, SqliteTaskStore, StorageError};
