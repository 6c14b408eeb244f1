//! Coordinator-side bookkeeping: specialist state and stop conditions.

use chrono::{DateTime, Utc};
use council_domain::{
    DiscussionStatistics, SpecialistId, SpecialistRuntimeState, SpecialistStatistics,
    SpecialistStatus, TerminationReason,
};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// How a unit's round ended in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    /// Transient errors outlasted the retry budget.
    Transient,
    Persistent,
    RateLimited,
}

/// Owns every [`SpecialistRuntimeState`] of one discussion and decides
/// when the discussion is over.
pub(crate) struct DiscussionTracker {
    states: BTreeMap<SpecialistId, SpecialistRuntimeState>,
    passes_by_round: BTreeMap<u32, HashSet<SpecialistId>>,
    finished: HashSet<SpecialistId>,
    thinking: HashSet<SpecialistId>,
    peak_thinking: usize,
    last_activity: Instant,
    persistent_failure_limit: u32,
    failures: Vec<FailureKind>,
    last_error: Option<String>,
}

impl DiscussionTracker {
    pub fn new(specialists: &[SpecialistId], persistent_failure_limit: u32, now: Instant) -> Self {
        Self {
            states: specialists
                .iter()
                .map(|id| (id.clone(), SpecialistRuntimeState::default()))
                .collect(),
            passes_by_round: BTreeMap::new(),
            finished: HashSet::new(),
            thinking: HashSet::new(),
            peak_thinking: 0,
            last_activity: now,
            persistent_failure_limit: persistent_failure_limit.max(1),
            failures: Vec::new(),
            last_error: None,
        }
    }

    pub fn is_active(&self, id: &SpecialistId) -> bool {
        self.states.get(id).is_some_and(|s| s.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.states.values().filter(|s| s.is_active()).count()
    }

    pub fn status(&self, id: &SpecialistId) -> Option<SpecialistStatus> {
        self.states.get(id).map(|s| s.status)
    }

    pub fn statuses(&self) -> BTreeMap<SpecialistId, SpecialistStatus> {
        self.states
            .iter()
            .map(|(id, state)| (id.clone(), state.status))
            .collect()
    }

    /// A unit started a capability call.
    pub fn thinking_started(&mut self, id: &SpecialistId) {
        let Some(state) = self.states.get_mut(id) else {
            return;
        };
        if !state.is_active() {
            return;
        }
        state.status = SpecialistStatus::Thinking;
        self.thinking.insert(id.clone());
        self.peak_thinking = self.peak_thinking.max(self.thinking.len());
    }

    /// An accepted proposal is being written to the log.
    pub fn contributing(&mut self, id: &SpecialistId) {
        if let Some(state) = self.states.get_mut(id) {
            if state.is_active() {
                state.status = SpecialistStatus::Contributing;
            }
        }
    }

    pub fn record_contribution(&mut self, id: &SpecialistId, round: u32, elapsed: Duration, now: Instant) {
        if let Some(state) = self.states.get_mut(id) {
            state.record_contribution(round, elapsed);
            state.rounds_completed = state.rounds_completed.max(round);
        }
        self.last_activity = now;
        self.call_finished(id, now);
    }

    /// A pass, either from the policy (`elapsed` is `None`) or from the
    /// specialist itself.
    pub fn record_pass(
        &mut self,
        id: &SpecialistId,
        round: u32,
        elapsed: Option<Duration>,
        now: Instant,
    ) -> Option<TerminationReason> {
        if let Some(state) = self.states.get_mut(id) {
            state.record_pass(elapsed);
            state.rounds_completed = state.rounds_completed.max(round);
        }
        if elapsed.is_some() {
            self.call_finished(id, now);
        }
        self.passes_by_round
            .entry(round)
            .or_default()
            .insert(id.clone());
        self.all_passed()
    }

    /// Returns `(removed, stop)`.
    pub fn record_failure(
        &mut self,
        id: &SpecialistId,
        round: u32,
        kind: FailureKind,
        message: String,
        now: Instant,
    ) -> (bool, Option<TerminationReason>) {
        self.call_finished(id, now);
        self.failures.push(kind);
        self.last_error = Some(format!("{}: {}", id, message));

        let limit = self.persistent_failure_limit;
        let mut removed = false;
        if let Some(state) = self.states.get_mut(id) {
            state.record_error(kind == FailureKind::Persistent);
            state.rounds_completed = state.rounds_completed.max(round);
            if state.is_active() && state.persistent_failures >= limit {
                state.status = SpecialistStatus::Removed;
                removed = true;
            }
        }

        if self.active_count() == 0 {
            return (removed, Some(TerminationReason::NoActiveSpecialists));
        }
        // The removed specialist may have been the only one missing from a round.
        (removed, if removed { self.all_passed() } else { None })
    }

    /// A unit exited its round loop.
    pub fn record_finished(&mut self, id: &SpecialistId) -> Option<TerminationReason> {
        self.finished.insert(id.clone());
        self.thinking.remove(id);
        self.all_finished()
    }

    /// A unit died mid-round. Counts as a persistent failure and removes
    /// the specialist at once.
    pub fn record_crash(
        &mut self,
        id: &SpecialistId,
        message: String,
        now: Instant,
    ) -> Option<TerminationReason> {
        self.call_finished(id, now);
        self.finished.insert(id.clone());
        self.failures.push(FailureKind::Persistent);
        self.last_error = Some(format!("{}: {}", id, message));
        if let Some(state) = self.states.get_mut(id) {
            state.record_error(true);
            state.status = SpecialistStatus::Removed;
        }

        if self.active_count() == 0 {
            return Some(TerminationReason::NoActiveSpecialists);
        }
        self.all_passed().or_else(|| self.all_finished())
    }

    /// Round the specialist is currently in.
    pub fn current_round(&self, id: &SpecialistId) -> u32 {
        self.states
            .get(id)
            .map(|s| s.rounds_completed + 1)
            .unwrap_or(1)
    }

    pub fn check_idle(&self, now: Instant, grace: Duration) -> Option<TerminationReason> {
        (self.thinking.is_empty() && now.duration_since(self.last_activity) >= grace)
            .then_some(TerminationReason::Idle)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|k| **k == kind).count()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn statistics(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        total_contributions: usize,
        rolling_summaries: u32,
        termination: TerminationReason,
    ) -> DiscussionStatistics {
        let specialists = self
            .states
            .iter()
            .map(|(id, state)| {
                let stats = SpecialistStatistics {
                    contributions: state.contribution_count,
                    passes: state.passes,
                    errors: state.errors,
                    removed: !state.is_active(),
                    avg_response_ms: state
                        .average_response_time()
                        .map(|d| d.as_millis() as u64),
                };
                (id.clone(), stats)
            })
            .collect();

        DiscussionStatistics {
            started_at,
            finished_at,
            total_contributions,
            specialists,
            peak_concurrent_thinking: self.peak_thinking,
            rolling_summaries,
            termination,
        }
    }

    fn call_finished(&mut self, id: &SpecialistId, now: Instant) {
        if self.thinking.remove(id) && self.thinking.is_empty() {
            self.last_activity = now;
        }
    }

    fn all_finished(&self) -> Option<TerminationReason> {
        let all_done = self
            .states
            .iter()
            .filter(|(_, s)| s.is_active())
            .all(|(id, _)| self.finished.contains(id));
        (all_done && self.active_count() > 0).then_some(TerminationReason::MaxRounds)
    }

    fn all_passed(&self) -> Option<TerminationReason> {
        let active: Vec<&SpecialistId> = self
            .states
            .iter()
            .filter(|(_, s)| s.is_active())
            .map(|(id, _)| id)
            .collect();
        if active.is_empty() {
            return None;
        }
        self.passes_by_round
            .iter()
            .find(|(_, passed)| active.iter().all(|id| passed.contains(*id)))
            .map(|(round, _)| TerminationReason::AllPassed { round: *round })
    }
}
