//! Immutable, version-stamped views of a discussion log.

use super::contribution::Contribution;
use crate::core::ids::SpecialistId;
use std::sync::Arc;

/// A consistent read-only view of the log at some version.
///
/// Cloning is cheap; the contribution list is shared. The writer appends
/// through [`DiscussionSnapshot::push`], which copies only when an older
/// snapshot is still alive.
#[derive(Debug, Clone, Default)]
pub struct DiscussionSnapshot {
    contributions: Arc<Vec<Contribution>>,
    version: u64,
}

impl DiscussionSnapshot {
    pub fn new(contributions: Vec<Contribution>, version: u64) -> Self {
        Self {
            contributions: Arc::new(contributions),
            version,
        }
    }

    /// Push a contribution and bump the version.
    pub fn push(&mut self, contribution: Contribution) {
        Arc::make_mut(&mut self.contributions).push(contribution);
        self.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn last(&self) -> Option<&Contribution> {
        self.contributions.last()
    }

    /// The trailing `n` contributions (fewer if the log is shorter).
    pub fn tail(&self, n: usize) -> &[Contribution] {
        let start = self.contributions.len().saturating_sub(n);
        &self.contributions[start..]
    }

    pub fn count_by(&self, specialist: &SpecialistId) -> usize {
        self.contributions
            .iter()
            .filter(|c| &c.specialist == specialist)
            .count()
    }

    /// Contributions appended after the given 1-based sequence number.
    pub fn since(&self, sequence: u64) -> &[Contribution] {
        let start = (sequence as usize).min(self.contributions.len());
        &self.contributions[start..]
    }

    /// The whole log rendered for a prompt.
    pub fn transcript(&self) -> String {
        self.contributions
            .iter()
            .map(Contribution::to_transcript_entry)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn contribution(seq: u64, who: &str) -> Contribution {
        Contribution {
            sequence: seq,
            round: 1,
            specialist: SpecialistId::try_new(who).unwrap(),
            text: format!("point from {}", who),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn push_bumps_version_without_touching_old_snapshots() {
        let mut live = DiscussionSnapshot::default();
        live.push(contribution(1, "Divergent"));
        let before = live.clone();
        live.push(contribution(2, "Critical"));

        assert_eq!(before.version(), 1);
        assert_eq!(before.len(), 1);
        assert_eq!(live.version(), 2);
        assert_eq!(live.len(), 2);
    }

    #[test]
    fn tail_and_count() {
        let mut log = DiscussionSnapshot::default();
        for (i, who) in ["A", "B", "A", "C"].iter().enumerate() {
            log.push(contribution(i as u64 + 1, who));
        }
        let tail: Vec<_> = log.tail(3).iter().map(|c| c.specialist.as_str()).collect();
        assert_eq!(tail, ["B", "A", "C"]);
        assert_eq!(log.tail(10).len(), 4);
        assert_eq!(log.count_by(&SpecialistId::try_new("A").unwrap()), 2);
    }

    #[test]
    fn since_skips_seen_contributions() {
        let mut log = DiscussionSnapshot::default();
        log.push(contribution(1, "A"));
        log.push(contribution(2, "B"));
        assert_eq!(log.since(0).len(), 2);
        assert_eq!(log.since(1)[0].specialist.as_str(), "B");
        assert!(log.since(5).is_empty());
    }

    #[test]
    fn transcript_lists_every_entry() {
        let mut log = DiscussionSnapshot::default();
        log.push(contribution(1, "Divergent"));
        log.push(contribution(2, "Critical"));
        let transcript = log.transcript();
        assert!(transcript.contains("--- Contribution 1 ---"));
        assert!(transcript.contains("Specialist: Critical (round 1)"));
        assert!(transcript.contains("point from Divergent"));
    }
}
