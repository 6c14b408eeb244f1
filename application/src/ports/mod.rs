//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.
//! Lightweight in-process implementations (no-op observer, in-memory
//! stores) live next to their port.

pub mod bucket_store;
pub mod capability;
pub mod clock;
pub mod conversation_logger;
pub mod discussion_observer;
pub mod task_store;
