//! Task store port
//!
//! Durable task records consumed and produced by the coordinator and polled
//! by callers. `claim` / `claim_next_pending` are the only operations that
//! need mutual exclusion across processes; adapters implement them as a
//! conditional update (`pending -> in_progress` only if still pending).

use async_trait::async_trait;
use chrono::Utc;
use council_domain::{
    Contribution, DiscussionStatistics, DomainError, NewTask, RollingSummary, SessionId,
    SpecialistId, SpecialistStatus, Task, TaskId, TaskStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task {0} is already claimed")]
    ClaimConflict(TaskId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Task store backend error: {0}")]
    Backend(String),
}

impl TaskStoreError {
    pub fn is_claim_conflict(&self) -> bool {
        matches!(self, TaskStoreError::ClaimConflict(_))
    }
}

/// Persistence for discussion tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Store a new pending task.
    async fn create(&self, task: NewTask) -> Result<TaskId, TaskStoreError>;

    /// Claim a specific pending task. `ClaimConflict` if it is not pending.
    async fn claim(&self, id: TaskId) -> Result<Task, TaskStoreError>;

    /// Claim the oldest pending task of a session, if any.
    async fn claim_next_pending(&self, session: &SessionId) -> Result<Option<Task>, TaskStoreError>;

    async fn append_result(
        &self,
        id: TaskId,
        contribution: &Contribution,
    ) -> Result<(), TaskStoreError>;

    async fn record_rolling_summary(
        &self,
        id: TaskId,
        summary: &RollingSummary,
    ) -> Result<(), TaskStoreError>;

    async fn record_progress(
        &self,
        id: TaskId,
        statuses: &BTreeMap<SpecialistId, SpecialistStatus>,
    ) -> Result<(), TaskStoreError>;

    async fn complete(
        &self,
        id: TaskId,
        final_synthesis: &str,
        statistics: &DiscussionStatistics,
    ) -> Result<(), TaskStoreError>;

    async fn fail(
        &self,
        id: TaskId,
        reason: &str,
        statistics: Option<&DiscussionStatistics>,
    ) -> Result<(), TaskStoreError>;

    async fn get(&self, id: TaskId) -> Result<Task, TaskStoreError>;

    /// Tasks of a session, oldest first.
    async fn list(&self, session: &SessionId) -> Result<Vec<Task>, TaskStoreError>;

    /// Contributions appended after the log version a poller last saw.
    async fn contributions_since(
        &self,
        id: TaskId,
        version: u64,
    ) -> Result<Vec<Contribution>, TaskStoreError> {
        let task = self.get(id).await?;
        Ok(task.contributions_since(version).to_vec())
    }
}

/// In-process task store for tests and ephemeral runs.
///
/// Every operation takes one short lock, which makes claims atomic.
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> Result<R, TaskStoreError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|e| TaskStoreError::Backend(format!("task store lock poisoned: {}", e)))?;
        Ok(f(&mut state))
    }

    fn update(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut Task) -> Result<(), DomainError>,
    ) -> Result<(), TaskStoreError> {
        self.with_state(|state| {
            let task = state.tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
            f(task).map_err(TaskStoreError::from)
        })?
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: NewTask) -> Result<TaskId, TaskStoreError> {
        let id = TaskId::generate();
        let task = task.into_task(id, Utc::now());
        self.with_state(|state| {
            state.tasks.insert(id, task);
            state.order.push(id);
        })?;
        Ok(id)
    }

    async fn claim(&self, id: TaskId) -> Result<Task, TaskStoreError> {
        self.with_state(|state| {
            let task = state.tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
            if task.status != TaskStatus::Pending {
                return Err(TaskStoreError::ClaimConflict(id));
            }
            task.claim(Utc::now())?;
            Ok(task.clone())
        })?
    }

    async fn claim_next_pending(&self, session: &SessionId) -> Result<Option<Task>, TaskStoreError> {
        self.with_state(|state| {
            let MemoryState { tasks, order } = state;
            let next = order.iter().find(|id| {
                tasks
                    .get(*id)
                    .is_some_and(|t| t.status == TaskStatus::Pending && &t.session == session)
            });
            let Some(id) = next.copied() else {
                return Ok(None);
            };
            let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
            task.claim(Utc::now())?;
            Ok(Some(task.clone()))
        })?
    }

    async fn append_result(
        &self,
        id: TaskId,
        contribution: &Contribution,
    ) -> Result<(), TaskStoreError> {
        self.update(id, |task| task.append_contribution(contribution.clone()))
    }

    async fn record_rolling_summary(
        &self,
        id: TaskId,
        summary: &RollingSummary,
    ) -> Result<(), TaskStoreError> {
        self.update(id, |task| task.record_rolling_summary(summary.clone()))
    }

    async fn record_progress(
        &self,
        id: TaskId,
        statuses: &BTreeMap<SpecialistId, SpecialistStatus>,
    ) -> Result<(), TaskStoreError> {
        self.update(id, |task| task.record_progress(statuses.clone()))
    }

    async fn complete(
        &self,
        id: TaskId,
        final_synthesis: &str,
        statistics: &DiscussionStatistics,
    ) -> Result<(), TaskStoreError> {
        self.update(id, |task| {
            task.complete(final_synthesis, Some(statistics.clone()), Utc::now())
        })
    }

    async fn fail(
        &self,
        id: TaskId,
        reason: &str,
        statistics: Option<&DiscussionStatistics>,
    ) -> Result<(), TaskStoreError> {
        self.update(id, |task| task.fail(reason, statistics.cloned(), Utc::now()))
    }

    async fn get(&self, id: TaskId) -> Result<Task, TaskStoreError> {
        self.with_state(|state| state.tasks.get(&id).cloned())?
            .ok_or(TaskStoreError::NotFound(id))
    }

    async fn list(&self, session: &SessionId) -> Result<Vec<Task>, TaskStoreError> {
        self.with_state(|state| {
            state
                .order
                .iter()
                .filter_map(|id| state.tasks.get(id))
                .filter(|t| &t.session == session)
                .cloned()
                .collect()
        })
    }
}
