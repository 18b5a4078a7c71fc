//! Escalation audit trail (spec §4.2, §6 `congress_escalation_*.json`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::ProviderState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub provider_id: String,
    pub kind: super::error::ErrorKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub context: String,
    pub providers: Vec<ProviderState>,
    pub error_history: Vec<ErrorEntry>,
    pub created_at: DateTime<Utc>,
}

impl EscalationRecord {
    pub fn new(context: impl Into<String>, providers: Vec<ProviderState>, error_history: Vec<ErrorEntry>) -> Self {
        Self { context: context.into(), providers, error_history, created_at: Utc::now() }
    }

    /// File name for this record under the escalation directory, keyed on
    /// its own creation timestamp so concurrent escalations never collide.
    pub fn file_name(&self) -> String {
        format!("congress_escalation_{}.json", self.created_at.timestamp_millis())
    }
}
