//! Slave Manager: registration, version parity, health monitoring, and
//! remote execution dispatch, master side (spec §4.3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::SlaveManagerConfig;
use crate::domain::WorkerStatus;
use crate::notify::Notifier;
use crate::persistence;
use crate::version::MasterVersion;

use super::client::{ExecuteResponse, SlaveClient};
use super::error::SlaveError;
use super::model::{InstallMethod, Slave};

pub struct SlaveManager {
    config: SlaveManagerConfig,
    slaves: Mutex<HashMap<String, Slave>>,
    client: SlaveClient,
    notifier: Arc<dyn Notifier>,
    master_version: MasterVersion,
    data_dir: PathBuf,
}

impl SlaveManager {
    pub fn new(config: SlaveManagerConfig, notifier: Arc<dyn Notifier>, master_version: MasterVersion, data_dir: PathBuf) -> Self {
        let restored: HashMap<String, Slave> = persistence::read_json(&Self::config_path_for(&data_dir))
            .ok()
            .flatten()
            .map(|slaves: Vec<Slave>| slaves.into_iter().map(|s| (s.slave_id().to_string(), s)).collect())
            .unwrap_or_default();

        Self { config, slaves: Mutex::new(restored), client: SlaveClient::new(), notifier, master_version, data_dir }
    }

    fn config_path_for(data_dir: &std::path::Path) -> PathBuf {
        data_dir.join("slaves").join("config.json")
    }

    async fn persist(&self) {
        let slaves = self.slaves.lock().await;
        let snapshot: Vec<&Slave> = slaves.values().collect();
        if let Err(e) = persistence::write_json_atomic(&Self::config_path_for(&self.data_dir), &snapshot) {
            warn!(error = %e, "failed to persist slave registry");
        }
    }

    /// Register a slave and probe it immediately (spec §4.3 "Registration").
    pub async fn register_slave(&self, worker_type: impl Into<String>, host: impl Into<String>, port: u16, auth_token: impl Into<String>, install_method: InstallMethod) -> Result<String, SlaveError> {
        let mut slave = Slave::new(worker_type, host, port, auth_token, install_method);
        let slave_id = slave.slave_id().to_string();

        let health = self.client.health(&slave).await?;
        slave.worker.capabilities = health.execution_methods.iter().cloned().collect();
        slave.worker.commit_fingerprint = Some(health.commit.clone());
        slave.worker.status = WorkerStatus::Online;
        slave.version_mismatch = !self.master_version.matches(&health.commit);
        slave.last_seen = Utc::now();

        {
            let mut slaves = self.slaves.lock().await;
            slaves.insert(slave_id.clone(), slave);
        }
        self.persist().await;
        info!(slave_id = %slave_id, "slave registered");
        Ok(slave_id)
    }

    pub async fn list_slaves(&self) -> Vec<Slave> {
        self.slaves.lock().await.values().cloned().collect()
    }

    /// One health-check pass over every registered slave (spec §4.3 "Health
    /// checking"); callers loop this on an interval.
    pub async fn check_all_health(&self) {
        let slave_ids: Vec<String> = self.slaves.lock().await.keys().cloned().collect();
        for slave_id in slave_ids {
            self.check_one_health(&slave_id).await;
        }
        self.persist().await;
    }

    async fn check_one_health(&self, slave_id: &str) {
        let slave_snapshot = {
            let slaves = self.slaves.lock().await;
            slaves.get(slave_id).cloned()
        };
        let Some(slave_snapshot) = slave_snapshot else { return };

        match self.client.health(&slave_snapshot).await {
            Ok(health) => {
                let mismatch = !self.master_version.matches(&health.commit);
                let mut slaves = self.slaves.lock().await;
                if let Some(slave) = slaves.get_mut(slave_id) {
                    slave.last_seen = Utc::now();
                    slave.consecutive_health_failures = 0;
                    slave.worker.status = WorkerStatus::Online;
                    slave.worker.commit_fingerprint = Some(health.commit.clone());
                    let was_mismatched = slave.version_mismatch;
                    slave.version_mismatch = mismatch;
                    if mismatch && !was_mismatched {
                        drop(slaves);
                        warn!(slave_id, master_commit = %self.master_version.commit, slave_commit = %health.commit, "slave version mismatch detected");
                        self.notifier.notify(&format!("slave {slave_id} version mismatch: master={} slave={}", self.master_version.commit, health.commit)).await;
                    }
                }
            }
            Err(e) => {
                warn!(slave_id, error = %e, "slave health check failed");
                let mut slaves = self.slaves.lock().await;
                if let Some(slave) = slaves.get_mut(slave_id) {
                    slave.consecutive_health_failures += 1;
                    let dead_by_failures = slave.consecutive_health_failures >= self.config.max_consecutive_health_failures;
                    let dead_by_silence = Utc::now().signed_duration_since(slave.last_seen) > chrono::Duration::seconds(self.config.slave_dead_threshold_secs);
                    if dead_by_failures || dead_by_silence {
                        slave.worker.status = WorkerStatus::Dead;
                    }
                }
            }
        }
    }

    /// Dispatch a shell command to a slave (spec §4.3 "Remote execution").
    pub async fn execute_on_slave(&self, slave_id: &str, command: &str, working_dir: &str, timeout: Duration) -> Result<ExecuteResponse, SlaveError> {
        let slave = {
            let slaves = self.slaves.lock().await;
            slaves.get(slave_id).cloned().ok_or_else(|| SlaveError::UnknownSlave(slave_id.to_string()))?
        };

        if slave.version_mismatch {
            return Err(SlaveError::VersionMismatch(slave_id.to_string()));
        }
        if slave.worker.status != WorkerStatus::Online {
            return Err(SlaveError::NotOnline(slave_id.to_string()));
        }

        self.client.execute(&slave, command, working_dir, timeout).await
    }

    /// Pull, rebuild, and restart a slave, then confirm it converged onto the
    /// master's commit (spec §4.3 "Auto-update").
    pub async fn auto_update_slave(&self, slave_id: &str) -> Result<bool, SlaveError> {
        let slave = {
            let slaves = self.slaves.lock().await;
            slaves.get(slave_id).cloned().ok_or_else(|| SlaveError::UnknownSlave(slave_id.to_string()))?
        };

        let update_command = match slave.install_method {
            InstallMethod::Docker => "docker compose pull && docker compose up -d --build",
            InstallMethod::Venv => "git pull && pip install -e .",
            InstallMethod::Native => "git pull && cargo build --release",
        };
        self.client.execute(&slave, update_command, &slave.base_url(), Duration::from_secs(self.config.execute_timeout_secs)).await?;
        self.client.restart(&slave).await?;

        tokio::time::sleep(Duration::from_secs(self.config.auto_update_grace_secs)).await;

        self.check_one_health(slave_id).await;
        let updated = self.slaves.lock().await.get(slave_id).map(|s| !s.version_mismatch).unwrap_or(false);
        Ok(updated)
    }
}
