//! Discussion tasks and their lifecycle.
//!
//! ```text
//! pending ──claim──▶ in_progress ──complete──▶ completed
//!                         │
//!                         └──────fail────────▶ failed
//! ```

pub mod entity;
pub mod status;

pub use entity::{NewTask, Task, TaskResult};
pub use status::TaskStatus;
