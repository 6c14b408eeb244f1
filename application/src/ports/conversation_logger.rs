//! Port for structured transcript logging.
//!
//! [`ConversationLogger`] records discussion events (contributions, passes,
//! rolling summaries, the final synthesis) as machine-readable records,
//! separate from `tracing` diagnostics.

use council_domain::{Contribution, RollingSummary, SpecialistId, TaskId, TerminationReason};
use serde_json::{Value, json};

/// A structured discussion event.
pub struct ConversationEvent {
    /// Event type identifier (e.g. "contribution", "pass", "synthesis").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    pub fn contribution(task: TaskId, contribution: &Contribution) -> Self {
        Self::new(
            "contribution",
            json!({
                "task_id": task.to_string(),
                "sequence": contribution.sequence,
                "round": contribution.round,
                "specialist": contribution.specialist.as_str(),
                "text": contribution.text,
            }),
        )
    }

    pub fn pass(task: TaskId, specialist: &SpecialistId, round: u32, asked: bool) -> Self {
        Self::new(
            "pass",
            json!({
                "task_id": task.to_string(),
                "specialist": specialist.as_str(),
                "round": round,
                "asked": asked,
            }),
        )
    }

    pub fn capability_error(task: TaskId, specialist: &SpecialistId, round: u32, error: &str) -> Self {
        Self::new(
            "capability_error",
            json!({
                "task_id": task.to_string(),
                "specialist": specialist.as_str(),
                "round": round,
                "error": error,
            }),
        )
    }

    pub fn rolling_summary(task: TaskId, summary: &RollingSummary) -> Self {
        Self::new(
            "rolling_summary",
            json!({
                "task_id": task.to_string(),
                "source_log_version": summary.source_log_version,
                "text": summary.text,
            }),
        )
    }

    pub fn terminated(task: TaskId, reason: &TerminationReason, contributions: usize) -> Self {
        Self::new(
            "terminated",
            json!({
                "task_id": task.to_string(),
                "reason": reason,
                "contributions": contributions,
            }),
        )
    }

    pub fn synthesis(task: TaskId, text: &str, fallback: bool) -> Self {
        Self::new(
            "synthesis",
            json!({
                "task_id": task.to_string(),
                "text": text,
                "fallback": fallback,
            }),
        )
    }
}

/// Port for logging discussion events to a structured log.
///
/// `log` is synchronous and infallible; logging failures never disturb
/// the discussion.
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
