//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod process_tasks;
pub mod run_discussion;
