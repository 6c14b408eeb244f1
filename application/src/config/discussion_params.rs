//! Discussion parameters - coordinator loop control.
//!
//! [`DiscussionParams`] groups the static parameters that control
//! [`DiscussionCoordinator`](crate::use_cases::run_discussion::DiscussionCoordinator).
//! Policy limits (caps, windows, cutoffs) live in the domain's `PolicyConfig`.

use std::time::Duration;

/// Coordinator loop control parameters.
#[derive(Debug, Clone)]
pub struct DiscussionParams {
    /// Rounds each specialist unit may run.
    pub max_rounds: u32,
    /// Wall-clock cap on the whole discussion, measured from claim.
    pub specialist_timeout: Duration,
    /// Cap on the final synthesis call, rate-limit wait included.
    pub synthesis_timeout: Duration,
    /// Sleep between unit rounds; also the drain window after stop.
    pub poll_interval: Duration,
    /// Stop after this long with no contribution and no call in flight.
    pub idle_grace: Duration,
    /// Interval between rolling summary checks.
    pub rolling_summary_interval: Duration,
    /// Retries for transient capability errors within one round.
    pub max_transient_retries: u32,
    /// Base delay for transient retries (doubled per attempt).
    pub transient_backoff: Duration,
    /// Persistent failures after which a specialist is removed.
    pub persistent_failure_limit: u32,
}

impl Default for DiscussionParams {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            specialist_timeout: Duration::from_secs(300),
            synthesis_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            idle_grace: Duration::from_secs(6),
            rolling_summary_interval: Duration::from_secs(10),
            max_transient_retries: 3,
            transient_backoff: Duration::from_millis(500),
            persistent_failure_limit: 2,
        }
    }
}

impl DiscussionParams {
    // ==================== Builder Methods ====================

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    pub fn with_specialist_timeout(mut self, timeout: Duration) -> Self {
        self.specialist_timeout = timeout;
        self
    }

    pub fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_idle_grace(mut self, grace: Duration) -> Self {
        self.idle_grace = grace;
        self
    }

    pub fn with_rolling_summary_interval(mut self, interval: Duration) -> Self {
        self.rolling_summary_interval = interval;
        self
    }

    pub fn with_max_transient_retries(mut self, retries: u32) -> Self {
        self.max_transient_retries = retries;
        self
    }

    pub fn with_transient_backoff(mut self, backoff: Duration) -> Self {
        self.transient_backoff = backoff;
        self
    }

    pub fn with_persistent_failure_limit(mut self, limit: u32) -> Self {
        self.persistent_failure_limit = limit.max(1);
        self
    }

    /// Backoff before transient retry number `attempt` (0-based).
    pub fn transient_delay(&self, attempt: u32) -> Duration {
        self.transient_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Polling cadence for the task worker.
#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for WorkerParams {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
        }
    }
}
