//! LLM Fallback Manager: multi-provider dispatch, cooldowns, escalation
//! (spec §4.2).

mod client;
mod error;
mod escalation;
mod manager;
mod persistence;
mod provider;

pub use client::{HttpProviderAdapter, ProviderAdapter};
pub use error::{ErrorKind, ProviderError};
pub use escalation::EscalationRecord;
pub use manager::{ChatOutcome, FallbackManager};
pub use provider::ProviderState;
