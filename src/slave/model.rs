//! Slave model: a remote execution host, extending `Worker` (spec §3).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Worker, WorkerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMethod {
    Docker,
    Venv,
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slave {
    pub worker: Worker,
    pub host: String,
    pub port: u16,
    pub auth_token: String,
    pub install_method: InstallMethod,
    pub version_mismatch: bool,
    pub last_seen: DateTime<Utc>,
    pub consecutive_health_failures: u32,
}

impl Slave {
    pub fn new(worker_type: impl Into<String>, host: impl Into<String>, port: u16, auth_token: impl Into<String>, install_method: InstallMethod) -> Self {
        Self {
            worker: Worker::new(worker_type, BTreeSet::new()),
            host: host.into(),
            port,
            auth_token: auth_token.into(),
            install_method,
            version_mismatch: false,
            last_seen: Utc::now(),
            consecutive_health_failures: 0,
        }
    }

    pub fn slave_id(&self) -> &str {
        &self.worker.worker_id
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Eligible for dispatch iff online, not dead, and on the master's commit.
    pub fn is_eligible_for_execution(&self) -> bool {
        !self.version_mismatch && self.worker.status == WorkerStatus::Online
    }
}
