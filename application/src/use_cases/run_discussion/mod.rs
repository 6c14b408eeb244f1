//! Run Discussion use case
//!
//! Claims a task, runs one concurrent unit per assigned specialist against a
//! shared append-only log, keeps a rolling summary, decides when to stop and
//! writes the final synthesis back to the task store.
//!
//! ```text
//!   unit (Alpha) ──┐                       ┌──> LogReader snapshots
//!   unit (Beta)  ──┼── UnitEvent (mpsc) ──> coordinator ── DiscussionLog (single writer)
//!   unit (Gamma) ──┘                       └──> TaskStore / observer / JSONL
//!                               SummaryScheduler (interval) ──> rolling summary
//! ```

mod log;
mod summary;
mod tracker;
mod unit;

#[cfg(test)]
mod tests;

pub use log::{DiscussionLog, LogReader};
pub use summary::{SummaryReport, SummaryScheduler};

use crate::config::DiscussionParams;
use crate::ports::capability::{Capability, CapabilityError};
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::discussion_observer::{DiscussionObserver, NoProgress};
use crate::ports::task_store::{TaskStore, TaskStoreError};
use council_domain::{
    CapabilityEndpoint, Contribution, ContributionPolicy, DiscussionSnapshot,
    DiscussionStatistics, GenerationRequest, PromptTemplate, RollingSummary, Roster,
    SpecialistId, SpecialistProfile, Task, TaskId, TaskStatus,
    TerminationReason,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracker::{DiscussionTracker, FailureKind};
use unit::{SpecialistUnit, UnitEvent};

/// Synthesis text for a discussion nobody spoke in.
pub const NO_DISCUSSION: &str = "No discussion occurred.";

/// Synthesis text when the synthesizer fails and no rolling summary exists.
pub const SYNTHESIS_UNAVAILABLE: &str = "Unable to generate summary.";

/// Errors that can occur while running a discussion
#[derive(Error, Debug)]
pub enum RunDiscussionError {
    #[error("Task {0} is already claimed")]
    ClaimConflict(TaskId),

    #[error("Unknown specialist: {0}")]
    UnknownSpecialist(SpecialistId),

    #[error("Task {0} has no specialists assigned")]
    NoSpecialists(TaskId),

    #[error("Task store error: {0}")]
    Store(TaskStoreError),
}

impl From<TaskStoreError> for RunDiscussionError {
    fn from(e: TaskStoreError) -> Self {
        match e {
            TaskStoreError::ClaimConflict(id) => RunDiscussionError::ClaimConflict(id),
            other => RunDiscussionError::Store(other),
        }
    }
}

/// Final state of a discussion as written to the task store.
#[derive(Debug, Clone)]
pub struct DiscussionOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub contributions: Vec<Contribution>,
    pub rolling_summary: Option<RollingSummary>,
    pub final_synthesis: Option<String>,
    pub failure_reason: Option<String>,
    pub statistics: DiscussionStatistics,
}

impl DiscussionOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Use case for running one specialist discussion to completion.
pub struct DiscussionCoordinator<C: Capability + 'static> {
    capability: Arc<C>,
    store: Arc<dyn TaskStore>,
    roster: Roster,
    policy: ContributionPolicy,
    params: DiscussionParams,
    synthesizer: Option<CapabilityEndpoint>,
    observer: Arc<dyn DiscussionObserver>,
    logger: Arc<dyn ConversationLogger>,
    clock: Arc<dyn Clock>,
}

impl<C: Capability + 'static> DiscussionCoordinator<C> {
    pub fn new(capability: Arc<C>, store: Arc<dyn TaskStore>, roster: Roster) -> Self {
        Self {
            capability,
            store,
            roster,
            policy: ContributionPolicy::default(),
            params: DiscussionParams::default(),
            synthesizer: None,
            observer: Arc::new(NoProgress),
            logger: Arc::new(NoConversationLogger),
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_policy(mut self, policy: ContributionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_params(mut self, params: DiscussionParams) -> Self {
        self.params = params;
        self
    }

    /// Endpoint for rolling summaries and the final synthesis. Defaults to
    /// the first assigned specialist's endpoint.
    pub fn with_synthesizer(mut self, endpoint: CapabilityEndpoint) -> Self {
        self.synthesizer = Some(endpoint);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DiscussionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn params(&self) -> &DiscussionParams {
        &self.params
    }

    /// Claim `task_id` and run its discussion.
    pub async fn run(&self, task_id: TaskId) -> Result<DiscussionOutcome, RunDiscussionError> {
        let task = self.store.claim(task_id).await?;
        self.run_claimed(task).await
    }

    /// Run the discussion of a task this coordinator already claimed.
    pub async fn run_claimed(&self, task: Task) -> Result<DiscussionOutcome, RunDiscussionError> {
        let task_id = task.id;
        let profiles = match self.roster.resolve(&task.assigned) {
            Ok(profiles) => profiles,
            Err(unknown) => {
                warn!("Task {}: unknown specialist {}", task_id, unknown);
                let reason = format!("Unknown specialist: {}", unknown);
                self.store.fail(task_id, &reason, None).await?;
                return Err(RunDiscussionError::UnknownSpecialist(unknown));
            }
        };

        let Some(first) = profiles.first() else {
            self.store
                .fail(task_id, "No specialists assigned", None)
                .await?;
            return Err(RunDiscussionError::NoSpecialists(task_id));
        };
        let synthesizer = self
            .synthesizer
            .clone()
            .unwrap_or_else(|| first.endpoint().clone());
        let ids: Vec<SpecialistId> = profiles.iter().map(|p| p.id().clone()).collect();
        let started_at = self.clock.now();
        let started = Instant::now();

        info!(
            "Task {}: discussion started with {} specialists (max {} rounds, timeout {:?})",
            task_id,
            ids.len(),
            self.params.max_rounds,
            self.params.specialist_timeout
        );
        self.observer.on_started(task_id, &ids);

        let mut log = DiscussionLog::new();
        let (summary_tx, summary_rx) = watch::channel(None);
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let mut units = JoinSet::new();
        let mut unit_tokens = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let token = stop.child_token();
            unit_tokens.push((profile.id().clone(), token.clone()));
            let unit = SpecialistUnit {
                profile: profile.clone(),
                query: task.query.clone(),
                policy: self.policy.clone(),
                params: self.params.clone(),
                capability: Arc::clone(&self.capability),
                log: log.reader(),
                summary: summary_rx.clone(),
                events: events_tx.clone(),
                cancel: token,
            };
            units.spawn(unit.supervise());
        }
        drop(events_tx);

        let summary_stop = CancellationToken::new();
        let scheduler = SummaryScheduler {
            task_id,
            query: task.query.clone(),
            endpoint: synthesizer.clone(),
            interval: self.params.rolling_summary_interval,
            capability: Arc::clone(&self.capability),
            log: log.reader(),
            publish: summary_tx,
            store: Arc::clone(&self.store),
            observer: Arc::clone(&self.observer),
            logger: Arc::clone(&self.logger),
            clock: Arc::clone(&self.clock),
        };
        let scheduler_handle = tokio::spawn(scheduler.run(summary_stop.clone()));

        let mut tracker =
            DiscussionTracker::new(&ids, self.params.persistent_failure_limit, started);
        let mut round_state = RunState {
            task_id,
            profiles: &profiles,
            unit_tokens: &unit_tokens,
            log: &mut log,
            tracker: &mut tracker,
        };

        // ==================== Main loop ====================

        let deadline = tokio::time::sleep(self.params.specialist_timeout);
        tokio::pin!(deadline);
        let mut idle_check = tokio::time::interval(self.params.poll_interval);
        idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break TerminationReason::Timeout,
                event = events.recv() => match event {
                    Some(event) => {
                        if let Some(reason) = self.handle_event(&mut round_state, event).await {
                            break reason;
                        }
                    }
                    None => break TerminationReason::MaxRounds,
                },
                _ = idle_check.tick() => {
                    if let Some(reason) = round_state
                        .tracker
                        .check_idle(Instant::now(), self.params.idle_grace)
                    {
                        break reason;
                    }
                }
            }
        };

        info!(
            "Task {}: stopping after {:?} ({})",
            task_id,
            started.elapsed(),
            reason
        );
        self.observer.on_terminated(task_id, &reason);

        // ==================== Drain ====================

        // In-flight calls get one poll interval to land; late proposals are still admitted.
        stop.cancel();
        let drain = tokio::time::sleep(self.params.poll_interval);
        tokio::pin!(drain);
        loop {
            tokio::select! {
                _ = &mut drain => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(&mut round_state, event).await;
                    }
                    None => break,
                },
            }
        }
        units.abort_all();
        let mut aborted = 0;
        while let Some(joined) = units.join_next().await {
            match joined {
                Err(e) if e.is_cancelled() => aborted += 1,
                Err(e) => warn!("Task {}: unit supervisor failed: {}", task_id, e),
                Ok(()) => {}
            }
        }
        if aborted > 0 {
            debug!("Task {}: aborted {} straggling units", task_id, aborted);
        }

        summary_stop.cancel();
        let summaries = match scheduler_handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!("Task {}: summary scheduler panicked: {}", task_id, e);
                SummaryReport::default()
            }
        };

        let snapshot = log.snapshot();
        self.logger.log(ConversationEvent::terminated(
            task_id,
            &reason,
            snapshot.len(),
        ));
        let statistics = tracker.statistics(
            started_at,
            self.clock.now(),
            snapshot.len(),
            summaries.generated,
            reason,
        );

        // ==================== Outcome ====================

        if snapshot.is_empty() && (tracker.has_failures() || reason.is_timeout()) {
            let failure = failure_reason(&tracker, reason);
            warn!("Task {}: failed: {}", task_id, failure);
            self.store.fail(task_id, &failure, Some(&statistics)).await?;
            return Ok(DiscussionOutcome {
                task_id,
                status: TaskStatus::Failed,
                contributions: Vec::new(),
                rolling_summary: summaries.latest,
                final_synthesis: None,
                failure_reason: Some(failure),
                statistics,
            });
        }

        let synthesis = if snapshot.is_empty() {
            info!("Task {}: nobody contributed", task_id);
            NO_DISCUSSION.to_string()
        } else {
            self.synthesize(
                task_id,
                &task,
                &synthesizer,
                &snapshot,
                summaries.latest.as_ref(),
            )
            .await
        };

        self.store.complete(task_id, &synthesis, &statistics).await?;
        info!(
            "Task {}: completed with {} contributions",
            task_id,
            snapshot.len()
        );

        Ok(DiscussionOutcome {
            task_id,
            status: TaskStatus::Completed,
            contributions: snapshot.contributions().to_vec(),
            rolling_summary: summaries.latest,
            final_synthesis: Some(synthesis),
            failure_reason: None,
            statistics,
        })
    }

    /// Apply one unit event. Returns a termination reason once a stop
    /// condition is met.
    async fn handle_event(
        &self,
        state: &mut RunState<'_>,
        event: UnitEvent,
    ) -> Option<TerminationReason> {
        let task_id = state.task_id;
        match event {
            UnitEvent::Thinking { specialist } => {
                state.tracker.thinking_started(&specialist);
                self.status_changed(state, &specialist).await;
                None
            }
            UnitEvent::Propose {
                specialist,
                round,
                text,
                elapsed,
                reply,
            } => {
                let Some(profile) = state.profile(&specialist) else {
                    let _ = reply.send(false);
                    return None;
                };
                let admitted = if !state.tracker.is_active(&specialist) {
                    Err("specialist was removed".to_string())
                } else {
                    self.policy
                        .admits(profile, &state.log.snapshot())
                        .map_err(|reason| reason.to_string())
                };

                match admitted {
                    Ok(()) => {
                        state.tracker.contributing(&specialist);
                        self.status_changed(state, &specialist).await;

                        let contribution =
                            state
                                .log
                                .append(round, specialist.clone(), text, self.clock.now());
                        state
                            .tracker
                            .record_contribution(&specialist, round, elapsed, Instant::now());
                        let _ = reply.send(true);

                        debug!(
                            "Task {}: #{} from {} (round {})",
                            task_id, contribution.sequence, specialist, round
                        );
                        if let Err(e) = self.store.append_result(task_id, &contribution).await {
                            warn!("Task {}: failed to store contribution: {}", task_id, e);
                        }
                        self.observer.on_contribution(task_id, &contribution);
                        self.logger
                            .log(ConversationEvent::contribution(task_id, &contribution));
                        self.status_changed(state, &specialist).await;
                        None
                    }
                    Err(why) => {
                        debug!(
                            "Task {}: proposal from {} rejected at append: {}",
                            task_id, specialist, why
                        );
                        let _ = reply.send(false);
                        self.passed(state, &specialist, round, Some(elapsed)).await
                    }
                }
            }
            UnitEvent::Passed {
                specialist,
                round,
                elapsed,
            } => self.passed(state, &specialist, round, elapsed).await,
            UnitEvent::Failed {
                specialist,
                round,
                error,
            } => {
                let kind = match &error {
                    CapabilityError::Persistent(_) => FailureKind::Persistent,
                    CapabilityError::RateLimited { .. } => FailureKind::RateLimited,
                    CapabilityError::Transient(_) => FailureKind::Transient,
                };
                self.logger.log(ConversationEvent::capability_error(
                    task_id,
                    &specialist,
                    round,
                    &error.to_string(),
                ));
                let (removed, stop) = state.tracker.record_failure(
                    &specialist,
                    round,
                    kind,
                    error.to_string(),
                    Instant::now(),
                );
                if removed {
                    warn!(
                        "Task {}: removing {} after {} persistent failures",
                        task_id, specialist, self.params.persistent_failure_limit
                    );
                    state.cancel_unit(&specialist);
                }
                self.status_changed(state, &specialist).await;
                stop
            }
            UnitEvent::Crashed {
                specialist,
                message,
            } => {
                warn!(
                    "Task {}: unit for {} panicked: {}",
                    task_id, specialist, message
                );
                let round = state.tracker.current_round(&specialist);
                self.logger.log(ConversationEvent::capability_error(
                    task_id,
                    &specialist,
                    round,
                    &format!("panicked: {}", message),
                ));
                let stop = state.tracker.record_crash(
                    &specialist,
                    format!("panicked: {}", message),
                    Instant::now(),
                );
                self.status_changed(state, &specialist).await;
                stop
            }
            UnitEvent::Finished { specialist } => {
                debug!("Task {}: {} finished its rounds", task_id, specialist);
                state.tracker.record_finished(&specialist)
            }
        }
    }

    async fn passed(
        &self,
        state: &mut RunState<'_>,
        specialist: &SpecialistId,
        round: u32,
        elapsed: Option<Duration>,
    ) -> Option<TerminationReason> {
        let stop = state
            .tracker
            .record_pass(specialist, round, elapsed, Instant::now());
        self.observer.on_pass(state.task_id, specialist, round);
        self.logger.log(ConversationEvent::pass(
            state.task_id,
            specialist,
            round,
            elapsed.is_some(),
        ));
        if elapsed.is_some() {
            self.status_changed(state, specialist).await;
        }
        stop
    }

    /// Publish a specialist's current status to the observer and the store.
    async fn status_changed(&self, state: &RunState<'_>, specialist: &SpecialistId) {
        let Some(status) = state.tracker.status(specialist) else {
            return;
        };
        self.observer.on_status(state.task_id, specialist, status);
        if let Err(e) = self
            .store
            .record_progress(state.task_id, &state.tracker.statuses())
            .await
        {
            warn!("Task {}: failed to store progress: {}", state.task_id, e);
        }
    }

    async fn synthesize(
        &self,
        task_id: TaskId,
        task: &Task,
        endpoint: &CapabilityEndpoint,
        snapshot: &DiscussionSnapshot,
        last_summary: Option<&RollingSummary>,
    ) -> String {
        let request = GenerationRequest::new(
            endpoint.clone(),
            PromptTemplate::synthesis(&task.query, snapshot, last_summary),
        )
        .with_system_prompt(PromptTemplate::synthesis_system());

        let result = match tokio::time::timeout(
            self.params.synthesis_timeout,
            self.capability.generate(&request),
        )
        .await
        {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("synthesis timed out".to_string()),
        };

        match result {
            Ok(text) => {
                let text = text.trim().to_string();
                self.logger
                    .log(ConversationEvent::synthesis(task_id, &text, false));
                text
            }
            Err(e) => {
                warn!("Task {}: final synthesis failed: {}", task_id, e);
                let fallback = last_summary
                    .map(|s| s.text.clone())
                    .unwrap_or_else(|| SYNTHESIS_UNAVAILABLE.to_string());
                self.logger
                    .log(ConversationEvent::synthesis(task_id, &fallback, true));
                fallback
            }
        }
    }
}

/// Borrowed per-run state threaded through event handling.
struct RunState<'a> {
    task_id: TaskId,
    profiles: &'a [SpecialistProfile],
    unit_tokens: &'a [(SpecialistId, CancellationToken)],
    log: &'a mut DiscussionLog,
    tracker: &'a mut DiscussionTracker,
}

impl RunState<'_> {
    fn profile(&self, id: &SpecialistId) -> Option<&SpecialistProfile> {
        self.profiles.iter().find(|p| p.id() == id)
    }

    fn cancel_unit(&self, id: &SpecialistId) {
        if let Some((_, token)) = self.unit_tokens.iter().find(|(unit, _)| unit == id) {
            token.cancel();
        }
    }
}

fn failure_reason(tracker: &DiscussionTracker, reason: TerminationReason) -> String {
    let cause = if tracker.failure_count(FailureKind::RateLimited) > 0 {
        "rate limit exhausted"
    } else if tracker.failure_count(FailureKind::Persistent) > 0 {
        "specialists failed"
    } else if reason.is_timeout() {
        "discussion timed out"
    } else {
        "specialists kept erroring"
    };
    match tracker.last_error() {
        Some(last) => format!("No contributions ({}); last error: {}", cause, last),
        None => format!("No contributions ({})", cause),
    }
}
