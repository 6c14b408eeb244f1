//! Discussion log vocabulary.
//!
//! A discussion is an append-only sequence of [`Contribution`]s. Readers
//! never see the live log; they get a version-stamped [`DiscussionSnapshot`].

pub mod contribution;
pub mod outcome;
pub mod snapshot;
pub mod statistics;
pub mod summary;
pub mod termination;

pub use contribution::Contribution;
pub use outcome::TurnOutcome;
pub use snapshot::DiscussionSnapshot;
pub use statistics::{DiscussionStatistics, SpecialistStatistics};
pub use summary::RollingSummary;
pub use termination::TerminationReason;
