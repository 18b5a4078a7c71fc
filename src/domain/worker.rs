//! Worker type: a registered execution endpoint (spec §3).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Busy,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub worker_type: String,
    pub capabilities: BTreeSet<String>,
    pub status: WorkerStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Present only for slave workers (spec §3, `Slave` extends `Worker`).
    pub endpoint: Option<String>,
    /// Short git commit hash, slave workers only.
    pub commit_fingerprint: Option<String>,
}

impl Worker {
    pub fn new(worker_type: impl Into<String>, capabilities: BTreeSet<String>) -> Self {
        Self {
            worker_id: Uuid::now_v7().to_string(),
            worker_type: worker_type.into(),
            capabilities,
            status: WorkerStatus::Online,
            last_heartbeat: Utc::now(),
            tasks_completed: 0,
            tasks_failed: 0,
            endpoint: None,
            commit_fingerprint: None,
        }
    }

    /// A worker matches a task iff every required capability is advertised.
    /// An empty requirement set matches any worker (spec §4.1 boundary case).
    pub fn satisfies(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_requirements_match_any_worker() {
        let worker = Worker::new("groq", BTreeSet::new());
        assert!(worker.satisfies(&BTreeSet::new()));
    }

    #[test]
    fn capability_subset_matching() {
        let mut caps = BTreeSet::new();
        caps.insert("groq".to_string());
        caps.insert("fast".to_string());
        let worker = Worker::new("groq", caps);

        let mut required = BTreeSet::new();
        required.insert("groq".to_string());
        assert!(worker.satisfies(&required));

        required.insert("gemini".to_string());
        assert!(!worker.satisfies(&required));
    }
}
