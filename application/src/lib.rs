//! Application layer for council
//!
//! This crate contains use cases, port definitions, rate limiting and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod rate_limit;
pub mod use_cases;

// Re-export commonly used types
pub use config::{DiscussionParams, RateLimitParams, WorkerParams};
pub use ports::{
    bucket_store::{BucketStore, BucketStoreError, InMemoryBucketStore},
    capability::{Capability, CapabilityError, StreamHandle},
    clock::{Clock, SystemClock},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    discussion_observer::{DiscussionObserver, NoProgress},
    task_store::{InMemoryTaskStore, TaskStore, TaskStoreError},
};
pub use rate_limit::{Permit, RateLimitError, RateLimitedCapability, RateLimiter};
pub use use_cases::process_tasks::{ProcessTasksUseCase, WorkerReport};
pub use use_cases::run_discussion::{
    DiscussionCoordinator, DiscussionOutcome, NO_DISCUSSION, RunDiscussionError,
};
