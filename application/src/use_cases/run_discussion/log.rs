//! Single-writer discussion log.

use chrono::{DateTime, Utc};
use council_domain::{Contribution, DiscussionSnapshot, SpecialistId};
use tokio::sync::watch;

/// The authoritative log of one discussion.
///
/// Only the coordinator owns it, and appending takes `&mut self`, so there
/// is exactly one writer. Every append publishes a new version-stamped
/// snapshot to all [`LogReader`]s.
pub struct DiscussionLog {
    tx: watch::Sender<DiscussionSnapshot>,
}

impl DiscussionLog {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DiscussionSnapshot::default());
        Self { tx }
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> DiscussionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version()
    }

    pub fn append(
        &mut self,
        round: u32,
        specialist: SpecialistId,
        text: String,
        timestamp: DateTime<Utc>,
    ) -> Contribution {
        let contribution = Contribution {
            sequence: self.tx.borrow().len() as u64 + 1,
            round,
            specialist,
            text,
            timestamp,
        };
        let published = contribution.clone();
        self.tx.send_modify(move |log| log.push(published));
        contribution
    }
}

impl Default for DiscussionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle to a [`DiscussionLog`].
#[derive(Clone)]
pub struct LogReader {
    rx: watch::Receiver<DiscussionSnapshot>,
}

impl LogReader {
    /// The latest published snapshot. Never blocks on the writer.
    pub fn snapshot(&self) -> DiscussionSnapshot {
        self.rx.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.rx.borrow().version()
    }
}
