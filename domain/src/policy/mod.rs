//! Contribution policy: should a specialist be invoked this tick?
//!
//! Pure and deterministic. Rules short-circuit in this order:
//!
//! 1. hard cap on contributions per specialist
//! 2. no immediate repeat of the last speaker
//! 3. anti-domination over the trailing window
//! 4. relevance gate (relaxed early for core specialists)
//! 5. late-stage gate with a stricter relevance bar

mod config;
mod relevance;

pub use config::PolicyConfig;
pub use relevance::relevance;

use crate::core::query::Query;
use crate::discussion::DiscussionSnapshot;
use crate::specialist::profile::SpecialistProfile;

/// Why a specialist was not invoked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    ContributionCap { count: usize },
    ImmediateRepeat,
    Domination { recent: usize },
    BelowRelevance { relevance: f64, threshold: f64 },
    LateStage { relevance: f64, threshold: f64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ContributionCap { count } => {
                write!(f, "contribution cap reached ({})", count)
            }
            SkipReason::ImmediateRepeat => write!(f, "spoke last"),
            SkipReason::Domination { recent } => {
                write!(f, "{} of the most recent contributions", recent)
            }
            SkipReason::BelowRelevance {
                relevance,
                threshold,
            } => write!(f, "relevance {:.2} < {:.2}", relevance, threshold),
            SkipReason::LateStage {
                relevance,
                threshold,
            } => write!(f, "late stage, relevance {:.2} < {:.2}", relevance, threshold),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyDecision {
    Contribute,
    Skip(SkipReason),
}

impl PolicyDecision {
    pub fn is_contribute(&self) -> bool {
        matches!(self, PolicyDecision::Contribute)
    }
}

/// Stateless evaluator holding the configured limits.
#[derive(Debug, Clone, Default)]
pub struct ContributionPolicy {
    config: PolicyConfig,
}

impl ContributionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn should_contribute(
        &self,
        specialist: &SpecialistProfile,
        snapshot: &DiscussionSnapshot,
        query: &Query,
    ) -> bool {
        self.evaluate(specialist, snapshot, query).is_contribute()
    }

    /// Full decision including the rule that disqualified the specialist.
    pub fn evaluate(
        &self,
        specialist: &SpecialistProfile,
        snapshot: &DiscussionSnapshot,
        query: &Query,
    ) -> PolicyDecision {
        if let Some(reason) = self.structural_violation(specialist, snapshot) {
            return PolicyDecision::Skip(reason);
        }

        let score = relevance(
            specialist.expertise(),
            query,
            snapshot.tail(self.config.relevance_window),
        );
        let thresholds = specialist.thresholds();
        let threshold = if snapshot.len() < self.config.early_stage_cutoff {
            thresholds.early
        } else {
            thresholds.standard
        };
        if score < threshold {
            return PolicyDecision::Skip(SkipReason::BelowRelevance {
                relevance: score,
                threshold,
            });
        }

        if snapshot.len() >= self.config.late_stage_cutoff && score < thresholds.late_stage {
            return PolicyDecision::Skip(SkipReason::LateStage {
                relevance: score,
                threshold: thresholds.late_stage,
            });
        }

        PolicyDecision::Contribute
    }

    /// Re-check only the log-shape rules (cap, repeat, domination).
    ///
    /// Used when a proposal reaches the writer, since the log may have grown
    /// since the snapshot the unit decided on.
    pub fn admits(&self, specialist: &SpecialistProfile, log: &DiscussionSnapshot) -> Result<(), SkipReason> {
        match self.structural_violation(specialist, log) {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    fn structural_violation(
        &self,
        specialist: &SpecialistProfile,
        snapshot: &DiscussionSnapshot,
    ) -> Option<SkipReason> {
        let id = specialist.id();

        let count = snapshot.count_by(id);
        if count >= self.config.max_contributions_per_specialist {
            return Some(SkipReason::ContributionCap { count });
        }

        if snapshot.last().is_some_and(|c| &c.specialist == id) {
            return Some(SkipReason::ImmediateRepeat);
        }

        let recent = snapshot
            .tail(self.config.anti_domination_window)
            .iter()
            .filter(|c| &c.specialist == id)
            .count();
        if recent >= self.config.anti_domination_limit {
            return Some(SkipReason::Domination { recent });
        }

        None
    }
}
