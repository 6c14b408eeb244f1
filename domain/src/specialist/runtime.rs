//! Per-task runtime state of a specialist.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// What a specialist is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistStatus {
    #[default]
    Idle,
    Thinking,
    Contributing,
    /// Excluded after repeated persistent failures.
    Removed,
}

impl SpecialistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistStatus::Idle => "idle",
            SpecialistStatus::Thinking => "thinking",
            SpecialistStatus::Contributing => "contributing",
            SpecialistStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for SpecialistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialistStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SpecialistStatus::Idle),
            "thinking" => Ok(SpecialistStatus::Thinking),
            "contributing" => Ok(SpecialistStatus::Contributing),
            "removed" => Ok(SpecialistStatus::Removed),
            other => Err(format!("unknown specialist status '{}'", other)),
        }
    }
}

/// Mutable bookkeeping for one specialist during one task.
///
/// Owned by the coordinator; units only report events that update it.
#[derive(Debug, Clone, Default)]
pub struct SpecialistRuntimeState {
    pub contribution_count: u32,
    pub last_contribution_round: Option<u32>,
    /// Set when the most recent completed round was a pass.
    pub consecutive_pass: bool,
    pub status: SpecialistStatus,
    pub passes: u32,
    pub errors: u32,
    pub persistent_failures: u32,
    /// Rounds this unit has finished (contribute, pass or error).
    pub rounds_completed: u32,
    response_times: Vec<Duration>,
}

impl SpecialistRuntimeState {
    pub fn record_contribution(&mut self, round: u32, elapsed: Duration) {
        self.contribution_count += 1;
        self.last_contribution_round = Some(round);
        self.consecutive_pass = false;
        self.status = SpecialistStatus::Idle;
        self.response_times.push(elapsed);
    }

    /// A pass. `elapsed` is set when the pass came back from a capability call.
    pub fn record_pass(&mut self, elapsed: Option<Duration>) {
        self.passes += 1;
        self.consecutive_pass = true;
        self.status = SpecialistStatus::Idle;
        if let Some(elapsed) = elapsed {
            self.response_times.push(elapsed);
        }
    }

    pub fn record_error(&mut self, persistent: bool) {
        self.errors += 1;
        if persistent {
            self.persistent_failures += 1;
        }
        self.consecutive_pass = false;
        if self.status != SpecialistStatus::Removed {
            self.status = SpecialistStatus::Idle;
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != SpecialistStatus::Removed
    }

    pub fn average_response_time(&self) -> Option<Duration> {
        if self.response_times.is_empty() {
            return None;
        }
        let total: Duration = self.response_times.iter().sum();
        Some(total / self.response_times.len() as u32)
    }
}
