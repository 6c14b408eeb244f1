//! Application-level configuration.
//!
//! Parameter groups that control how use cases behave:
//!
//! - [`DiscussionParams`] - rounds, deadlines, poll and summary intervals
//! - [`RateLimitParams`] - bucket capacity, provider retry policy, max wait
//! - [`WorkerParams`] - task polling cadence

pub mod discussion_params;
pub mod rate_limit_params;

pub use discussion_params::{DiscussionParams, WorkerParams};
pub use rate_limit_params::RateLimitParams;
