//! Core domain concepts shared across all subdomains.
//!
//! - [`query::Query`] - a validated user query put to the specialists
//! - [`ids`] - task, session and specialist identifiers
//! - [`error::DomainError`] - domain-level errors

pub mod error;
pub mod ids;
pub mod query;
pub mod string;
