//! Rate limiting for capability calls.
//!
//! - [`RateLimiter`] owns one token bucket per (provider, model), persisted
//!   write-through via the [`BucketStore`](crate::ports::bucket_store::BucketStore) port
//! - [`RateLimitedCapability`] wraps any capability: acquire, call, and on a
//!   provider rejection record it and retry with exponential backoff

mod capability;
mod limiter;

pub use capability::RateLimitedCapability;
pub use limiter::{Permit, RateLimitError, RateLimiter};
