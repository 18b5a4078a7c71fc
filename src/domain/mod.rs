//! Shared data model for the orchestration core (spec §3).

mod task;
mod worker;

pub use task::{Payload, ShellPayload, Task, TaskStatus, TaskType};
pub use worker::{Worker, WorkerStatus};

/// Scheduling priority, 1 (lowest) to 10 (highest).
///
/// Stored as a plain integer rather than an enum so producers can use the
/// full 1-10 range from spec §3 instead of a handful of named tiers.
pub type Priority = u8;

/// Clamp an arbitrary priority value into the valid 1-10 range.
pub fn clamp_priority(p: u8) -> Priority {
    p.clamp(1, 10)
}
