//! Policy limits.

use serde::{Deserialize, Serialize};

/// Limits applied by [`ContributionPolicy`](super::ContributionPolicy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Contributions allowed per specialist per task.
    pub max_contributions_per_specialist: usize,
    /// Trailing contributions inspected by the anti-domination rule.
    pub anti_domination_window: usize,
    /// Appearances inside the window that block another turn.
    pub anti_domination_limit: usize,
    /// Trailing contributions whose text feeds the relevance signal.
    pub relevance_window: usize,
    /// Log length below which early thresholds apply.
    pub early_stage_cutoff: usize,
    /// Log length from which the late-stage bar applies.
    pub late_stage_cutoff: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_contributions_per_specialist: 3,
            anti_domination_window: 3,
            anti_domination_limit: 2,
            relevance_window: 3,
            early_stage_cutoff: 6,
            late_stage_cutoff: 12,
        }
    }
}
