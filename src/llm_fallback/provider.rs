//! Per-provider health state (spec §3 `ProviderState`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ErrorKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderState {
    pub provider_id: String,
    pub is_available: bool,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_error_kind: Option<ErrorKind>,
}

impl ProviderState {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            is_available: true,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
            cooldown_until: None,
            last_error_kind: None,
        }
    }

    /// Missing credentials mark a provider unavailable at startup without
    /// failing the process (spec §6 env var policy).
    pub fn mark_missing_credentials(&mut self) {
        self.is_available = false;
    }

    pub fn is_selectable(&self, now: DateTime<Utc>) -> bool {
        if !self.is_available {
            return false;
        }
        match self.cooldown_until {
            Some(until) => now >= until,
            None => true,
        }
    }

    pub fn record_success(&mut self) {
        self.total_requests += 1;
        self.consecutive_failures = 0;
        self.cooldown_until = None;
        self.last_error_kind = None;
    }

    /// Apply a failure, returning the cooldown that was set (for logging).
    pub fn record_failure(&mut self, kind: ErrorKind, max_consecutive_failures: u32, now: DateTime<Utc>) {
        self.total_requests += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_error_kind = Some(kind);

        use super::error::Cooldown;
        match kind.cooldown(self.consecutive_failures) {
            Cooldown::Fixed(d) => {
                self.cooldown_until = Some(now + chrono::Duration::from_std(d).unwrap_or_default());
            }
            Cooldown::UntilRestart => {
                self.is_available = false;
            }
        }

        if self.consecutive_failures >= max_consecutive_failures {
            self.is_available = false;
        }
    }

    /// Clear any cooldown that has already expired (spec §4.2 persistence
    /// load rule).
    pub fn clear_expired_cooldown(&mut self, now: DateTime<Utc>) {
        if let Some(until) = self.cooldown_until
            && now >= until
        {
            self.cooldown_until = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_consecutive_failures() {
        let mut state = ProviderState::new("primary");
        state.record_failure(ErrorKind::RateLimit, 5, Utc::now());
        assert_eq!(state.consecutive_failures, 1);
        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.cooldown_until.is_none());
    }

    #[test]
    fn cooldown_provider_is_not_selectable() {
        let mut state = ProviderState::new("primary");
        let now = Utc::now();
        state.record_failure(ErrorKind::RateLimit, 5, now);
        assert!(!state.is_selectable(now));
        assert!(state.is_selectable(now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn exhausting_consecutive_failures_marks_unavailable() {
        let mut state = ProviderState::new("primary");
        let now = Utc::now();
        for _ in 0..3 {
            state.record_failure(ErrorKind::Unknown, 3, now);
        }
        assert!(!state.is_available);
    }
}
