//! Master-side HTTP client for driving a slave's worker protocol (spec §4.3).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::SlaveError;
use super::model::Slave;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub execution_methods: Vec<String>,
    pub version: String,
    pub commit: String,
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub method: String,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    command: &'a str,
    working_dir: &'a str,
}

pub struct SlaveClient {
    http: reqwest::Client,
}

impl SlaveClient {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    pub async fn health(&self, slave: &Slave) -> Result<HealthResponse, SlaveError> {
        let url = format!("{}/api/health", slave.base_url());
        let response = self
            .http
            .get(&url)
            .bearer_auth(&slave.auth_token)
            .send()
            .await
            .map_err(|e| SlaveError::Unreachable(slave.slave_id().to_string(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(SlaveError::BadResponse(slave.slave_id().to_string(), format!("health returned {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| SlaveError::BadResponse(slave.slave_id().to_string(), e.to_string()))
    }

    /// Sends the execute request unconditionally; callers on the task-dispatch
    /// path gate eligibility themselves (`SlaveManager::execute_on_slave`) so
    /// that auto-update, which targets a mismatched slave on purpose, can
    /// still reach it.
    pub async fn execute(&self, slave: &Slave, command: &str, working_dir: &str, timeout: Duration) -> Result<ExecuteResponse, SlaveError> {
        let url = format!("{}/api/execute", slave.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&slave.auth_token)
            .timeout(timeout)
            .json(&ExecuteRequest { command, working_dir })
            .send()
            .await
            .map_err(|e| SlaveError::Unreachable(slave.slave_id().to_string(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(SlaveError::BadResponse(slave.slave_id().to_string(), format!("execute returned {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| SlaveError::BadResponse(slave.slave_id().to_string(), e.to_string()))
    }

    pub async fn restart(&self, slave: &Slave) -> Result<(), SlaveError> {
        let url = format!("{}/api/restart", slave.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&slave.auth_token)
            .send()
            .await
            .map_err(|e| SlaveError::Unreachable(slave.slave_id().to_string(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(SlaveError::BadResponse(slave.slave_id().to_string(), format!("restart returned {}", response.status())));
        }
        Ok(())
    }
}

impl Default for SlaveClient {
    fn default() -> Self {
        Self::new()
    }
}
