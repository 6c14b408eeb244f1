//! Storage and logging configuration from TOML (`[storage]`, `[logging]`)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw storage configuration
///
/// ```toml
/// [storage]
/// database = "~/.local/share/council/council.db"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// SQLite database path (default: `<data dir>/council/council.db`)
    pub database: Option<String>,
}

impl FileStorageConfig {
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => expand_home(path),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("council")
                .join("council.db"),
        }
    }
}

/// Raw logging configuration
///
/// ```toml
/// [logging]
/// directory = "~/.local/state/council/logs"   # daily rolling diagnostics
/// conversation_log = "./transcripts.jsonl"     # JSONL discussion events
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for the rolling diagnostic log file. Console only when unset.
    pub directory: Option<String>,
    /// File name prefix of the rolling log
    pub file_prefix: String,
    /// JSONL transcript of discussion events
    pub conversation_log: Option<String>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "council.log".to_string(),
            conversation_log: None,
        }
    }
}

impl FileLoggingConfig {
    pub fn directory_path(&self) -> Option<PathBuf> {
        self.directory.as_deref().map(expand_home)
    }

    pub fn conversation_log_path(&self) -> Option<PathBuf> {
        self.conversation_log.as_deref().map(expand_home)
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
