//! On-disk state for the fallback manager (spec §4.2 "Persistence").

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persistence::{self, PersistenceError};

use super::escalation::ErrorEntry;
use super::provider::ProviderState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackState {
    pub providers: Vec<ProviderState>,
    pub error_history: Vec<ErrorEntry>,
    pub saved_at: DateTime<Utc>,
}

impl FallbackState {
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        persistence::write_json_atomic(path, self)
    }

    /// Load state from `path` if present and not older than `stale_after`.
    /// Expired cooldowns are cleared as they're loaded (spec §4.2).
    pub fn load(path: &Path, stale_after_secs: i64) -> Result<Option<Self>, PersistenceError> {
        let Some(mut state) = persistence::read_json::<Self>(path)? else {
            return Ok(None);
        };

        let now = Utc::now();
        if now.signed_duration_since(state.saved_at) > chrono::Duration::seconds(stale_after_secs) {
            return Ok(None);
        }

        for provider in &mut state.providers {
            provider.clear_expired_cooldown(now);
        }
        Ok(Some(state))
    }
}
