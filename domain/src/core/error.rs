//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("A task needs at least one assigned specialist")]
    NoSpecialists,

    #[error("Duplicate specialist: {0}")]
    DuplicateSpecialist(String),

    #[error("Invalid relevance threshold {value} for {name} (expected 0.0..=1.0)")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Invalid capability endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid task status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Unknown task status: {0}")]
    UnknownStatus(String),
}

impl DomainError {
    /// Check if this error comes from a rejected task state change
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, DomainError::InvalidTransition { .. })
    }
}
