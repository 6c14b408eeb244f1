//! Rolling summary value object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synopsis of the log as of `source_log_version`.
///
/// Only the latest one is kept per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingSummary {
    pub text: String,
    pub source_log_version: u64,
    pub generated_at: DateTime<Utc>,
}

impl RollingSummary {
    pub fn new(text: impl Into<String>, source_log_version: u64, generated_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            source_log_version,
            generated_at,
        }
    }

    /// Whether this summary already covers the given log version.
    pub fn covers(&self, version: u64) -> bool {
        self.source_log_version >= version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_same_or_older_versions() {
        let summary = RollingSummary::new("so far", 4, Utc::now());
        assert!(summary.covers(3));
        assert!(summary.covers(4));
        assert!(!summary.covers(5));
    }
}
