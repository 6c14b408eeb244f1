//! Token-bucket rate limiting, as pure state transitions.
//!
//! The bucket never reads a clock; callers pass `now`. That keeps the math
//! deterministic and lets the async limiter run on a paused test clock.

pub mod bucket;
pub mod key;

pub use bucket::{TokenBucket, WINDOW};
pub use key::RateLimitKey;
