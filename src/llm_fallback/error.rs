//! Failure classification for the fallback manager (spec §4.2, §7).
//!
//! Generalizes the teacher's `llm::error::LlmError` (single-provider) into a
//! closed taxonomy with per-kind cooldown policy, since this manager must
//! reason about cooldowns independent of any one provider's wire format.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    Timeout,
    Auth,
    Unavailable,
    InvalidResponse,
    Unknown,
}

impl ErrorKind {
    /// Cooldown to apply to the provider that produced this error, given how
    /// many consecutive failures it has now accrued (spec §4.2 table).
    pub fn cooldown(self, consecutive_failures: u32) -> Cooldown {
        match self {
            ErrorKind::RateLimit => Cooldown::Fixed(Duration::from_secs(60)),
            ErrorKind::Timeout => Cooldown::Fixed(Duration::from_secs(30)),
            ErrorKind::Auth => Cooldown::UntilRestart,
            ErrorKind::Unavailable | ErrorKind::InvalidResponse => {
                let secs = 10 * consecutive_failures.min(8) as u64;
                Cooldown::Fixed(Duration::from_secs(secs))
            }
            ErrorKind::Unknown => {
                let secs = (5u64.saturating_mul(1 << consecutive_failures.min(4))).min(80);
                Cooldown::Fixed(Duration::from_secs(secs))
            }
        }
    }

    pub fn escalation_weight(self) -> EscalationWeight {
        match self {
            ErrorKind::RateLimit => EscalationWeight::Low,
            ErrorKind::Auth => EscalationWeight::High,
            _ => EscalationWeight::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationWeight {
    Low,
    Medium,
    High,
}

/// How long a provider should be skipped for after a failure.
#[derive(Debug, Clone, Copy)]
pub enum Cooldown {
    Fixed(Duration),
    /// Auth failures are not time-bounded; only a process restart (or manual
    /// reset) clears them (spec §4.2).
    UntilRestart,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::RateLimited => ErrorKind::RateLimit,
            ProviderError::Timeout => ErrorKind::Timeout,
            ProviderError::Auth(_) => ErrorKind::Auth,
            ProviderError::Unavailable(_) => ErrorKind::Unavailable,
            ProviderError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            ProviderError::Network(_) => ErrorKind::Unknown,
        }
    }

    /// Classify an HTTP status code the way the provider adapter would.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => ProviderError::RateLimited,
            401 | 403 => ProviderError::Auth(body.to_string()),
            500..=599 => ProviderError::Unavailable(format!("status {status}")),
            _ => ProviderError::InvalidResponse(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_cooldown_is_fixed_60s() {
        assert!(matches!(ErrorKind::RateLimit.cooldown(1), Cooldown::Fixed(d) if d.as_secs() == 60));
    }

    #[test]
    fn unavailable_cooldown_scales_with_failures_and_caps() {
        assert!(matches!(ErrorKind::Unavailable.cooldown(2), Cooldown::Fixed(d) if d.as_secs() == 20));
        assert!(matches!(ErrorKind::Unavailable.cooldown(20), Cooldown::Fixed(d) if d.as_secs() == 80));
    }

    #[test]
    fn unknown_cooldown_doubles_and_caps_at_80() {
        assert!(matches!(ErrorKind::Unknown.cooldown(0), Cooldown::Fixed(d) if d.as_secs() == 5));
        assert!(matches!(ErrorKind::Unknown.cooldown(1), Cooldown::Fixed(d) if d.as_secs() == 10));
        assert!(matches!(ErrorKind::Unknown.cooldown(10), Cooldown::Fixed(d) if d.as_secs() == 80));
    }

    #[test]
    fn auth_error_maps_to_auth_kind() {
        let err = ProviderError::from_status(401, "nope");
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn server_error_maps_to_unavailable() {
        let err = ProviderError::from_status(503, "down");
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
