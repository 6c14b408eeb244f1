//! Domain layer for council
//!
//! Entities, value objects and pure decision logic. No I/O, no async, no
//! clocks: anything time-dependent takes `now` as an argument.
//!
//! # Core Concepts
//!
//! ## Discussion
//!
//! Several independent [`SpecialistProfile`]s answer one [`Query`]. Each
//! accepted answer becomes a [`Contribution`] in an append-only log that
//! readers see through version-stamped [`DiscussionSnapshot`]s.
//!
//! ## Contribution policy
//!
//! [`ContributionPolicy`] decides, per tick and per specialist, whether it is
//! worth asking that specialist at all (caps, anti-domination, relevance).
//!
//! ## Tasks
//!
//! A [`Task`] is the durable record of one discussion, moving
//! `pending -> in_progress -> completed | failed`.
//!
//! ## Rate limiting
//!
//! [`TokenBucket`] holds the refill math for one (provider, model) key.

pub mod config;
pub mod core;
pub mod discussion;
pub mod generation;
pub mod policy;
pub mod prompt;
pub mod rate_limit;
pub mod specialist;
pub mod task;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use core::{
    error::DomainError,
    ids::{SessionId, SpecialistId, TaskId},
    query::Query,
};
pub use discussion::{
    Contribution, DiscussionSnapshot, DiscussionStatistics, RollingSummary,
    SpecialistStatistics, TerminationReason, TurnOutcome,
};
pub use generation::{
    endpoint::{CapabilityEndpoint, ProviderKind},
    request::GenerationRequest,
    stream::StreamEvent,
};
pub use policy::{ContributionPolicy, PolicyConfig, PolicyDecision, SkipReason};
pub use prompt::PromptTemplate;
pub use rate_limit::{RateLimitKey, TokenBucket};
pub use specialist::{
    profile::{RelevanceThresholds, SpecialistProfile, SpecialistTier},
    roster::Roster,
    runtime::{SpecialistRuntimeState, SpecialistStatus},
};
pub use task::{NewTask, Task, TaskResult, TaskStatus};
