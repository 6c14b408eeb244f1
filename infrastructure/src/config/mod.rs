//! Configuration file loading for council
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `COUNCIL_` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./council.toml` or `./.council.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/council/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileConfig, FileDiscussionConfig, FileLoggingConfig, FileOllamaConfig, FileOpenRouterConfig,
    FileProvidersConfig, FileRateLimitConfig, FileRateLimitOverride, FileRosterConfig,
    FileSpecialistConfig, FileStorageConfig, FileSynthesizerConfig, FileWorkerConfig,
    build_roster,
};
pub use loader::ConfigLoader;

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),
}
