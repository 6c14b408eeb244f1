//! Why a discussion stopped.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Every active specialist passed in the same round.
    AllPassed { round: u32 },
    /// Every active unit used up its rounds.
    MaxRounds,
    /// The wall-clock deadline elapsed.
    Timeout,
    /// Nothing was contributed or in flight for the idle grace period.
    Idle,
    /// All specialists were removed after persistent failures.
    NoActiveSpecialists,
}

impl TerminationReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TerminationReason::Timeout)
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::AllPassed { round } => {
                write!(f, "all specialists passed in round {}", round)
            }
            TerminationReason::MaxRounds => write!(f, "maximum rounds reached"),
            TerminationReason::Timeout => write!(f, "discussion timed out"),
            TerminationReason::Idle => write!(f, "discussion went idle"),
            TerminationReason::NoActiveSpecialists => write!(f, "no active specialists left"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_reason_tag() {
        let json = serde_json::to_string(&TerminationReason::AllPassed { round: 3 }).unwrap();
        assert_eq!(json, r#"{"reason":"all_passed","round":3}"#);
        let back: TerminationReason = serde_json::from_str(r#"{"reason":"timeout"}"#).unwrap();
        assert!(back.is_timeout());
    }
}
