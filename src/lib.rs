//! Distributed task orchestration core: priority scheduling across
//! registered workers, multi-provider LLM fallback with adaptive cooldowns,
//! and authenticated remote execution against slave hosts.

pub mod cli;
pub mod config;
pub mod domain;
pub mod llm_fallback;
pub mod notify;
pub mod orchestrator;
pub mod persistence;
pub mod slave;
pub mod version;
