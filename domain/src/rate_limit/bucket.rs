//! Token bucket state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// The rolling window over which at most `capacity` acquisitions may succeed.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Token bucket for one (provider, model).
///
/// - capacity = requests per minute, refilled continuously at capacity/60 per second
/// - `reset_at`, when set, blocks acquisition until it passes, whatever the
///   refill math says
/// - acquisitions inside the trailing [`WINDOW`] are remembered so a full
///   bucket plus its refill can never exceed `capacity` in any 60 s window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    last_refill_at: DateTime<Utc>,
    reset_at: Option<DateTime<Utc>>,
    recent: VecDeque<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TokenBucket {
    /// A fresh, full bucket. Capacity is at least 1.
    pub fn full(capacity: u32, now: DateTime<Utc>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tokens: capacity as f64,
            last_refill_at: now,
            reset_at: None,
            recent: VecDeque::new(),
            updated_at: now,
        }
    }

    /// Rebuild a bucket from persisted fields, clamping anything out of range.
    pub fn restore(
        capacity: u32,
        tokens: f64,
        last_refill_at: DateTime<Utc>,
        reset_at: Option<DateTime<Utc>>,
        recent: impl IntoIterator<Item = DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let capacity = capacity.max(1);
        let mut recent: Vec<_> = recent.into_iter().collect();
        recent.sort();
        Self {
            capacity,
            tokens: tokens.clamp(0.0, capacity as f64),
            last_refill_at,
            reset_at,
            recent: recent.into(),
            updated_at,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Tokens as of the last mutation (see [`TokenBucket::available`]).
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_refill_at(&self) -> DateTime<Utc> {
        self.last_refill_at
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        self.reset_at
    }

    pub fn recent(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.recent.iter()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.capacity as f64 / WINDOW.as_secs_f64()
    }

    /// Change capacity (config reload). Tokens are clamped, never granted.
    pub fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity.max(1);
        self.tokens = self.tokens.min(self.capacity as f64);
    }

    /// Tokens that would be available at `now`, without mutating.
    pub fn available(&self, now: DateTime<Utc>) -> f64 {
        if self.reset_at.is_some_and(|reset| now < reset) {
            return 0.0;
        }
        let mut probe = self.clone();
        probe.settle(now);
        probe.tokens
    }

    /// Take one token, or return how long to wait before trying again.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> Result<(), Duration> {
        if let Some(reset) = self.reset_at {
            if now < reset {
                return Err(until(now, reset));
            }
        }
        self.settle(now);

        if self.recent.len() >= self.capacity as usize {
            if let Some(oldest) = self.recent.front() {
                return Err(until(now, *oldest + window()));
            }
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.recent.push_back(now);
            self.updated_at = now;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate()))
        }
    }

    /// Record a provider-signaled limit: zero tokens until `now + retry_after`.
    pub fn reject(&mut self, now: DateTime<Utc>, retry_after: Duration) {
        let delta = chrono::Duration::from_std(retry_after).unwrap_or_else(|_| chrono::Duration::days(1));
        let reset = now.checked_add_signed(delta).unwrap_or(now);
        self.reset_at = Some(self.reset_at.map_or(reset, |current| current.max(reset)));
        self.tokens = 0.0;
        self.last_refill_at = now;
        self.updated_at = now;
    }

    /// Apply refill and expire the reset and window entries.
    fn settle(&mut self, now: DateTime<Utc>) {
        if let Some(reset) = self.reset_at {
            if now >= reset {
                // the provider's window reopened: allow one probe request
                // and refill normally from the reset instant
                self.reset_at = None;
                self.tokens = self.tokens.max(1.0).min(self.capacity as f64);
                self.last_refill_at = reset;
            }
        }

        let elapsed = (now - self.last_refill_at).to_std().unwrap_or_default();
        if !elapsed.is_zero() {
            self.tokens =
                (self.tokens + elapsed.as_secs_f64() * self.refill_rate()).min(self.capacity as f64);
            self.last_refill_at = now;
        }

        let horizon = now - window();
        while self.recent.front().is_some_and(|t| *t <= horizon) {
            self.recent.pop_front();
        }
    }
}

fn window() -> chrono::Duration {
    chrono::Duration::seconds(WINDOW.as_secs() as i64)
}

fn until(now: DateTime<Utc>, then: DateTime<Utc>) -> Duration {
    (then - now).to_std().unwrap_or_default()
}
