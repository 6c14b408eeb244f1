//! Discussion statistics reported with a finished task.

use super::termination::TerminationReason;
use crate::core::ids::SpecialistId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-specialist counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecialistStatistics {
    pub contributions: u32,
    pub passes: u32,
    pub errors: u32,
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_response_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_contributions: usize,
    pub specialists: BTreeMap<SpecialistId, SpecialistStatistics>,
    pub peak_concurrent_thinking: usize,
    pub rolling_summaries: u32,
    pub termination: TerminationReason,
}

impl DiscussionStatistics {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn total_passes(&self) -> u32 {
        self.specialists.values().map(|s| s.passes).sum()
    }

    /// Specialists with at least one accepted contribution.
    pub fn participants(&self) -> impl Iterator<Item = &SpecialistId> {
        self.specialists
            .iter()
            .filter(|(_, s)| s.contributions > 0)
            .map(|(id, _)| id)
    }
}
