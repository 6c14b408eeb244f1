//! Discussion observer port
//!
//! Live notifications while a discussion runs. Implementations live in
//! the CLI (console output) and must not block.

use council_domain::{
    Contribution, RollingSummary, SpecialistId, SpecialistStatus, TaskId, TerminationReason,
};

pub trait DiscussionObserver: Send + Sync {
    /// Called when a contribution is accepted into the log
    fn on_contribution(&self, task: TaskId, contribution: &Contribution);

    /// Called once when the coordinator decides to stop
    fn on_terminated(&self, task: TaskId, reason: &TerminationReason);

    /// Called when the coordinator starts the specialist units
    fn on_started(&self, _task: TaskId, _specialists: &[SpecialistId]) {}

    /// Called when a specialist changes status
    fn on_status(&self, _task: TaskId, _specialist: &SpecialistId, _status: SpecialistStatus) {}

    /// Called when a specialist passes a round
    fn on_pass(&self, _task: TaskId, _specialist: &SpecialistId, _round: u32) {}

    /// Called when a new rolling summary is available
    fn on_rolling_summary(&self, _task: TaskId, _summary: &RollingSummary) {}
}

/// No-op observer for when live output is not needed
pub struct NoProgress;

impl DiscussionObserver for NoProgress {
    fn on_contribution(&self, _task: TaskId, _contribution: &Contribution) {}
    fn on_terminated(&self, _task: TaskId, _reason: &TerminationReason) {}
}
