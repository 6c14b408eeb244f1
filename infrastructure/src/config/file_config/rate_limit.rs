//! Rate limit configuration from TOML (`[rate_limit]` section)

use council_application::RateLimitParams;
use council_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Raw rate limit configuration from TOML
///
/// # Example
///
/// ```toml
/// [rate_limit]
/// requests_per_minute = 16      # default bucket capacity
/// max_retries = 3
/// retry_delay_secs = 5
/// max_wait_secs = 90
///
/// [rate_limit.overrides."openrouter/anthropic/claude-3.5-sonnet"]
/// requests_per_minute = 50
///
/// [rate_limit.overrides.ollama]
/// requests_per_minute = 600
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    pub requests_per_minute: u32,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub max_wait_secs: u64,
    /// Keyed by `provider` or `provider/model`
    pub overrides: BTreeMap<String, FileRateLimitOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRateLimitOverride {
    pub requests_per_minute: u32,
}

impl Default for FileRateLimitConfig {
    fn default() -> Self {
        let params = RateLimitParams::default();
        Self {
            requests_per_minute: params.requests_per_minute,
            max_retries: params.max_retries,
            retry_delay_secs: params.retry_delay.as_secs(),
            max_wait_secs: params.max_wait.as_secs(),
            overrides: BTreeMap::new(),
        }
    }
}

impl FileRateLimitConfig {
    pub fn to_params(&self) -> RateLimitParams {
        self.overrides.iter().fold(
            RateLimitParams::default()
                .with_requests_per_minute(self.requests_per_minute)
                .with_max_retries(self.max_retries)
                .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
                .with_max_wait(Duration::from_secs(self.max_wait_secs)),
            |params, (key, value)| params.with_override(key.clone(), value.requests_per_minute),
        )
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.requests_per_minute == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit {
                    field: "rate_limit.requests_per_minute".to_string(),
                },
                "rate_limit.requests_per_minute must be at least 1",
            ));
        }
        for (key, value) in &self.overrides {
            if value.requests_per_minute == 0 {
                let field = format!("rate_limit.overrides.\"{}\".requests_per_minute", key);
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroLimit {
                        field: field.clone(),
                    },
                    format!("{} must be at least 1", field),
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::RateLimitKey;

    #[test]
    fn overrides_reach_params() {
        let toml_str = r#"
requests_per_minute = 20

[overrides."openrouter/gpt-4o"]
requests_per_minute = 50

[overrides.ollama]
requests_per_minute = 600
"#;
        let config: FileRateLimitConfig = toml::from_str(toml_str).unwrap();
        let params = config.to_params();
        assert_eq!(
            params.capacity_for(&RateLimitKey::new("openrouter", "gpt-4o")),
            50
        );
        assert_eq!(
            params.capacity_for(&RateLimitKey::new("ollama", "llama3.1:8b")),
            600
        );
        assert_eq!(
            params.capacity_for(&RateLimitKey::new("openrouter", "other")),
            20
        );
        assert!(config.validate().is_empty());
    }

    #[test]
    fn zero_capacity_is_an_error() {
        let config = FileRateLimitConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        assert!(council_domain::config::validation::has_errors(
            &config.validate()
        ));
    }
}
