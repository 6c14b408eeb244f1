//! Contribution entity

use crate::core::ids::SpecialistId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A specialist's accepted text in the discussion log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// 1-based position in the log.
    pub sequence: u64,
    /// The unit round that produced it (1..=max_rounds).
    pub round: u32,
    pub specialist: SpecialistId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Contribution {
    /// Render as one transcript entry.
    pub fn to_transcript_entry(&self) -> String {
        format!(
            "--- Contribution {} ---\nSpecialist: {} (round {})\n{}\n",
            self.sequence, self.specialist, self.round, self.text
        )
    }
}
