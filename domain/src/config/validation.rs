//! Structured configuration issues.
//!
//! The loader reports problems as [`ConfigIssue`]s instead of failing on
//! the first one, so the CLI can print every warning and refuse to start
//! only when an [`Severity::Error`] is present.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: works, but probably not as intended.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// No specialists configured and the built-in roster disabled.
    EmptyRoster,
    /// Two specialists share an id.
    DuplicateSpecialist { id: String },
    /// A value could not be parsed (endpoint, tier, id).
    InvalidValue { field: String, value: String },
    /// A relevance threshold outside 0.0..=1.0.
    ThresholdOutOfRange { field: String },
    /// A limit that must be positive is zero.
    ZeroLimit { field: String },
    /// Cloud provider configured without an API key.
    MissingApiKey { provider: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }
}

/// Whether any issue is fatal.
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}
