//! Specialists: the independent contributors of a discussion.
//!
//! Every specialist is the same generic [`profile::SpecialistProfile`]
//! parametrized by its expertise keywords, relevance thresholds and the
//! capability endpoint that answers for it. [`roster::Roster`] holds the
//! configured set; [`runtime`] tracks per-task state while a discussion runs.

pub mod profile;
pub mod roster;
pub mod runtime;
