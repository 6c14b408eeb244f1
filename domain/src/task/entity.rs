//! Task entity

use super::status::TaskStatus;
use crate::core::error::DomainError;
use crate::core::ids::{SessionId, SpecialistId, TaskId};
use crate::core::query::Query;
use crate::discussion::{Contribution, DiscussionStatistics, RollingSummary};
use crate::specialist::runtime::SpecialistStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A task as submitted by a caller, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub session: SessionId,
    pub creator: String,
    pub query: Query,
    pub assigned: Vec<SpecialistId>,
}

impl NewTask {
    /// Validate the assignment. Duplicate ids are folded, order kept.
    pub fn new(
        session: SessionId,
        creator: impl Into<String>,
        query: Query,
        assigned: Vec<SpecialistId>,
    ) -> Result<Self, DomainError> {
        let mut unique: Vec<SpecialistId> = Vec::with_capacity(assigned.len());
        for id in assigned {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Err(DomainError::NoSpecialists);
        }
        Ok(Self {
            session,
            creator: creator.into(),
            query,
            assigned: unique,
        })
    }

    pub fn into_task(self, id: TaskId, now: DateTime<Utc>) -> Task {
        Task {
            id,
            session: self.session,
            creator: self.creator,
            query: self.query,
            assigned: self.assigned,
            status: TaskStatus::Pending,
            created_at: now,
            claimed_at: None,
            completed_at: None,
            result: TaskResult::default(),
        }
    }
}

/// Everything a discussion produced for a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub contributions: Vec<Contribution>,
    #[serde(default)]
    pub rolling_summary: Option<RollingSummary>,
    #[serde(default)]
    pub specialist_status: BTreeMap<SpecialistId, SpecialistStatus>,
    #[serde(default)]
    pub final_synthesis: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub statistics: Option<DiscussionStatistics>,
}

/// A discussion task (Entity).
///
/// Only the coordinator that claimed it mutates it, and only while
/// `in_progress`. Terminal tasks reject every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub session: SessionId,
    pub creator: String,
    pub query: Query,
    pub assigned: Vec<SpecialistId>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: TaskResult,
}

impl Task {
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.status = self.status.transition_to(TaskStatus::InProgress)?;
        self.claimed_at = Some(now);
        Ok(())
    }

    pub fn append_contribution(&mut self, contribution: Contribution) -> Result<(), DomainError> {
        self.ensure_in_progress("append contribution")?;
        self.result.contributions.push(contribution);
        Ok(())
    }

    /// Keep `summary` if it is newer than the stored one.
    pub fn record_rolling_summary(&mut self, summary: RollingSummary) -> Result<(), DomainError> {
        self.ensure_in_progress("record rolling summary")?;
        let newer = self
            .result
            .rolling_summary
            .as_ref()
            .is_none_or(|current| current.source_log_version < summary.source_log_version);
        if newer {
            self.result.rolling_summary = Some(summary);
        }
        Ok(())
    }

    pub fn record_progress(
        &mut self,
        statuses: BTreeMap<SpecialistId, SpecialistStatus>,
    ) -> Result<(), DomainError> {
        self.ensure_in_progress("record progress")?;
        self.result.specialist_status = statuses;
        Ok(())
    }

    pub fn complete(
        &mut self,
        final_synthesis: impl Into<String>,
        statistics: Option<DiscussionStatistics>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.status = self.status.transition_to(TaskStatus::Completed)?;
        self.result.final_synthesis = Some(final_synthesis.into());
        self.result.statistics = statistics;
        self.completed_at = Some(now.max(self.created_at));
        Ok(())
    }

    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        statistics: Option<DiscussionStatistics>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.status = self.status.transition_to(TaskStatus::Failed)?;
        self.result.failure_reason = Some(reason.into());
        self.result.statistics = statistics;
        self.completed_at = Some(now.max(self.created_at));
        Ok(())
    }

    /// Log version as seen by pollers: one increment per contribution.
    pub fn log_version(&self) -> u64 {
        self.result.contributions.len() as u64
    }

    /// Contributions a poller has not seen, given the last version it saw.
    pub fn contributions_since(&self, version: u64) -> &[Contribution] {
        let start = (version as usize).min(self.result.contributions.len());
        &self.result.contributions[start..]
    }

    fn ensure_in_progress(&self, action: &str) -> Result<(), DomainError> {
        if self.status == TaskStatus::InProgress {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: action.to_string(),
            })
        }
    }
}
