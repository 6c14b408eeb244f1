//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod discussion;
mod providers;
mod rate_limit;
mod specialists;
mod storage;

pub use discussion::{FileDiscussionConfig, FileWorkerConfig};
pub use providers::{FileOllamaConfig, FileOpenRouterConfig, FileProvidersConfig};
pub use rate_limit::{FileRateLimitConfig, FileRateLimitOverride};
pub use specialists::{
    FileRosterConfig, FileSpecialistConfig, FileSynthesizerConfig, build_roster,
};
pub use storage::{FileLoggingConfig, FileStorageConfig};

use council_domain::{
    CapabilityEndpoint, ConfigIssue, ConfigIssueCode, PolicyConfig, ProviderKind, Roster,
};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Coordinator loop control
    pub discussion: FileDiscussionConfig,
    /// Contribution policy limits (uses the domain type directly)
    pub policy: PolicyConfig,
    /// Token bucket sizing and provider retry policy
    pub rate_limit: FileRateLimitConfig,
    /// Backend connection settings
    pub providers: FileProvidersConfig,
    /// Roster-wide defaults
    pub roster: FileRosterConfig,
    /// Extra or overriding specialists
    pub specialists: Vec<FileSpecialistConfig>,
    /// Endpoint for summaries and synthesis
    pub synthesizer: FileSynthesizerConfig,
    /// Task worker polling
    pub worker: FileWorkerConfig,
    pub storage: FileStorageConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Errors make the configuration unusable; warnings describe values
    /// that were adjusted or features that will not work.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.discussion.validate());
        issues.extend(self.rate_limit.validate());
        issues.extend(self.validate_policy());

        let (roster, roster_issues) = self.roster();
        issues.extend(roster_issues);
        let (synthesizer, synthesizer_issues) = self.synthesizer.parse_endpoint();
        issues.extend(synthesizer_issues);

        // Cloud endpoints need a key.
        let uses_openrouter = roster
            .iter()
            .flat_map(|r| r.profiles().iter().map(|p| p.endpoint().clone()))
            .chain(synthesizer)
            .any(|e: CapabilityEndpoint| e.provider() == ProviderKind::OpenRouter);
        if uses_openrouter && self.providers.openrouter.resolve_api_key().is_none() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::MissingApiKey {
                    provider: "openrouter".to_string(),
                },
                format!(
                    "openrouter endpoints are configured but no API key is set (providers.openrouter.api_key or ${})",
                    self.providers.openrouter.api_key_env
                ),
            ));
        }

        issues
    }

    /// The configured roster, or `None` when it has error-level issues.
    pub fn roster(&self) -> (Option<Roster>, Vec<ConfigIssue>) {
        build_roster(&self.roster, &self.specialists)
    }

    fn validate_policy(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (field, value) in [
            (
                "policy.max_contributions_per_specialist",
                self.policy.max_contributions_per_specialist,
            ),
            ("policy.anti_domination_window", self.policy.anti_domination_window),
            ("policy.anti_domination_limit", self.policy.anti_domination_limit),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroLimit {
                        field: field.to_string(),
                    },
                    format!("{} must be at least 1", field),
                ));
            }
        }
        if self.policy.late_stage_cutoff < self.policy.early_stage_cutoff {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: "policy.late_stage_cutoff".to_string(),
                    value: self.policy.late_stage_cutoff.to_string(),
                },
                "policy.late_stage_cutoff is below early_stage_cutoff",
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::Severity;
    use council_domain::config::validation::has_errors;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[discussion]
max_rounds = 5
poll_interval_ms = 500

[policy]
max_contributions_per_specialist = 2

[rate_limit]
requests_per_minute = 20

[providers.openrouter]
api_key = "sk-test"

[roster]
endpoint = "openrouter:meta-llama/llama-3.1-8b-instruct"

[[specialists]]
id = "Security"
expertise = ["security"]

[synthesizer]
endpoint = "ollama:llama3.1:8b"

[storage]
database = "/tmp/council.db"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.discussion.max_rounds, 5);
        assert_eq!(config.policy.max_contributions_per_specialist, 2);
        assert_eq!(config.policy.anti_domination_limit, 2);
        assert_eq!(config.rate_limit.requests_per_minute, 20);
        assert_eq!(config.specialists.len(), 1);
        assert!(config.validate().is_empty());

        let roster = config.roster().0.unwrap();
        assert_eq!(roster.len(), 7);
    }

    #[test]
    fn test_default_config() {
        let config = FileConfig::default();
        assert_eq!(config.discussion.max_rounds, 10);
        assert_eq!(config.rate_limit.requests_per_minute, 16);
        assert_eq!(config.providers.ollama.host, "http://localhost:11434");
        assert!(config.roster.builtin);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn missing_openrouter_key_warns() {
        let mut config = FileConfig::default();
        config.roster.endpoint = "openrouter:gpt-4o-mini".to_string();
        config.providers.openrouter.api_key_env = "COUNCIL_TEST_NO_SUCH_VAR".to_string();

        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(!has_errors(&issues));
    }

    #[test]
    fn zero_policy_limit_is_an_error() {
        let mut config = FileConfig::default();
        config.policy.anti_domination_limit = 0;
        assert!(has_errors(&config.validate()));
    }
}
