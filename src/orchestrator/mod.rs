//! Orchestrator: task queue, worker registry, and HTTP API (spec §4.1, §6).

mod core;
mod error;
mod http;
mod queue;
mod sweeper;

pub use core::Orchestrator;
pub use error::OrchestratorError;
pub use http::router;
pub use sweeper::spawn_sweepers;
