//! Version parity support (spec §3 `MasterVersion`, §4.3 version-capture step).
//!
//! `GIT_COMMIT`/`GIT_BRANCH` are baked in at compile time by `build.rs`,
//! mirroring the teacher's `env!("GIT_DESCRIBE")` in `daemon.rs`. On startup
//! the master "invokes the version-capture step" by writing a fresh
//! `version_info.json` derived from those compile-time values plus the
//! crate version and current timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persistence::{self, PersistenceError};

/// Commit fingerprint baked in by `build.rs`.
pub const COMMIT: &str = env!("GIT_COMMIT");
pub const BRANCH: &str = env!("GIT_BRANCH");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterVersion {
    pub branch: String,
    pub commit: String,
    pub version: String,
    pub deployed_at: DateTime<Utc>,
}

impl MasterVersion {
    /// Run the version-capture step: refresh `version_info.json` from the
    /// compile-time commit fingerprint.
    pub fn capture() -> Self {
        Self {
            branch: BRANCH.to_string(),
            commit: COMMIT.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            deployed_at: Utc::now(),
        }
    }

    pub fn persist(&self) -> Result<(), PersistenceError> {
        let path = std::env::current_dir()
            .unwrap_or_else(|_| ".".into())
            .join("version_info.json");
        persistence::write_json_atomic(&path, self)
    }

    /// Whether a slave's reported commit matches ours (spec §4.3 version parity).
    pub fn matches(&self, slave_commit: &str) -> bool {
        self.commit == slave_commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reports_compiled_in_commit() {
        let v = MasterVersion::capture();
        assert_eq!(v.commit, COMMIT);
        assert!(v.matches(COMMIT));
        assert!(!v.matches("definitely-not-the-same-commit"));
    }
}
