//! Discussion and worker configuration from TOML (`[discussion]`, `[worker]`)

use council_application::{DiscussionParams, WorkerParams};
use council_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw discussion configuration from TOML
///
/// # Example
///
/// ```toml
/// [discussion]
/// max_rounds = 10
/// specialist_timeout_secs = 300
/// synthesis_timeout_secs = 60
/// poll_interval_ms = 1000
/// idle_grace_secs = 6
/// rolling_summary_interval_secs = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDiscussionConfig {
    pub max_rounds: u32,
    pub specialist_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub idle_grace_secs: u64,
    pub rolling_summary_interval_secs: u64,
    pub max_transient_retries: u32,
    pub transient_backoff_ms: u64,
    pub persistent_failure_limit: u32,
}

impl Default for FileDiscussionConfig {
    fn default() -> Self {
        let params = DiscussionParams::default();
        Self {
            max_rounds: params.max_rounds,
            specialist_timeout_secs: params.specialist_timeout.as_secs(),
            synthesis_timeout_secs: params.synthesis_timeout.as_secs(),
            poll_interval_ms: params.poll_interval.as_millis() as u64,
            idle_grace_secs: params.idle_grace.as_secs(),
            rolling_summary_interval_secs: params.rolling_summary_interval.as_secs(),
            max_transient_retries: params.max_transient_retries,
            transient_backoff_ms: params.transient_backoff.as_millis() as u64,
            persistent_failure_limit: params.persistent_failure_limit,
        }
    }
}

impl FileDiscussionConfig {
    pub fn to_params(&self) -> DiscussionParams {
        DiscussionParams::default()
            .with_max_rounds(self.max_rounds)
            .with_specialist_timeout(Duration::from_secs(self.specialist_timeout_secs))
            .with_synthesis_timeout(Duration::from_secs(self.synthesis_timeout_secs.max(1)))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms.max(1)))
            .with_idle_grace(Duration::from_secs(self.idle_grace_secs))
            .with_rolling_summary_interval(Duration::from_secs(
                self.rolling_summary_interval_secs.max(1),
            ))
            .with_max_transient_retries(self.max_transient_retries)
            .with_transient_backoff(Duration::from_millis(self.transient_backoff_ms))
            .with_persistent_failure_limit(self.persistent_failure_limit)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (field, value) in [
            ("discussion.max_rounds", self.max_rounds as u64),
            ("discussion.specialist_timeout_secs", self.specialist_timeout_secs),
            ("discussion.synthesis_timeout_secs", self.synthesis_timeout_secs),
            ("discussion.poll_interval_ms", self.poll_interval_ms),
            (
                "discussion.rolling_summary_interval_secs",
                self.rolling_summary_interval_secs,
            ),
            (
                "discussion.persistent_failure_limit",
                self.persistent_failure_limit as u64,
            ),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::ZeroLimit {
                        field: field.to_string(),
                    },
                    format!("{}: 0 is not allowed, using the smallest valid value", field),
                ));
            }
        }
        issues
    }
}

/// Raw worker configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWorkerConfig {
    /// Session whose queue `council worker` drains by default
    pub session: String,
    pub poll_interval_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for FileWorkerConfig {
    fn default() -> Self {
        let params = WorkerParams::default();
        Self {
            session: "default".to_string(),
            poll_interval_ms: params.poll_interval.as_millis() as u64,
            error_backoff_ms: params.error_backoff.as_millis() as u64,
        }
    }
}

impl FileWorkerConfig {
    pub fn to_params(&self) -> WorkerParams {
        WorkerParams {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
        }
    }
}
