//! Process Tasks use case
//!
//! A worker loop that polls the task store for pending tasks of one
//! session and runs each through a [`DiscussionCoordinator`].

use crate::config::WorkerParams;
use crate::ports::capability::Capability;
use crate::ports::task_store::TaskStore;
use crate::use_cases::run_discussion::{
    DiscussionCoordinator, DiscussionOutcome, RunDiscussionError,
};
use council_domain::SessionId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Totals for one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub completed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl WorkerReport {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }

    fn record(&mut self, outcome: &Result<DiscussionOutcome, RunDiscussionError>) {
        match outcome {
            Ok(outcome) if outcome.is_completed() => self.completed += 1,
            Ok(_) => self.failed += 1,
            Err(_) => self.errors += 1,
        }
    }
}

/// Use case for draining a session's task queue.
pub struct ProcessTasksUseCase<C: Capability + 'static> {
    coordinator: Arc<DiscussionCoordinator<C>>,
    store: Arc<dyn TaskStore>,
    session: SessionId,
    params: WorkerParams,
}

impl<C: Capability + 'static> ProcessTasksUseCase<C> {
    pub fn new(
        coordinator: Arc<DiscussionCoordinator<C>>,
        store: Arc<dyn TaskStore>,
        session: SessionId,
    ) -> Self {
        Self {
            coordinator,
            store,
            session,
            params: WorkerParams::default(),
        }
    }

    pub fn with_params(mut self, params: WorkerParams) -> Self {
        self.params = params;
        self
    }

    /// Claim and run at most one pending task.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    pub async fn run_once(
        &self,
    ) -> Result<Option<Result<DiscussionOutcome, RunDiscussionError>>, RunDiscussionError> {
        let Some(task) = self.store.claim_next_pending(&self.session).await? else {
            return Ok(None);
        };
        info!("Worker picked up task {}", task.id);
        Ok(Some(self.coordinator.run_claimed(task).await))
    }

    /// Poll until `cancel` fires, or until the queue is empty when
    /// `drain` is set.
    pub async fn run(&self, cancel: CancellationToken, drain: bool) -> WorkerReport {
        let mut report = WorkerReport::default();
        info!(
            "Worker started for session {} (poll every {:?})",
            self.session, self.params.poll_interval
        );

        while !cancel.is_cancelled() {
            let wait = match self.run_once().await {
                Ok(Some(outcome)) => {
                    if let Err(e) = &outcome {
                        warn!("Task run failed: {}", e);
                    }
                    report.record(&outcome);
                    continue;
                }
                Ok(None) if drain => break,
                Ok(None) => {
                    debug!("No pending tasks for session {}", self.session);
                    self.params.poll_interval
                }
                Err(e) => {
                    warn!("Failed to poll task store: {}", e);
                    report.errors += 1;
                    self.params.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!(
            "Worker stopped: {} completed, {} failed, {} errors",
            report.completed, report.failed, report.errors
        );
        report
    }
}
