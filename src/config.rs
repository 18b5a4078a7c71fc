//! TaskGrid configuration types and loading.
//!
//! Follows the teacher's fallback chain: explicit `--config` path, then a
//! project-local `.taskgrid.yml`, then a user config directory, then
//! built-in defaults (`config.rs` in the teacher repo).

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub llm: LlmFallbackConfig,
    pub slaves: SlaveManagerConfig,
}

impl Config {
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".taskgrid.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!("Failed to load config from {}: {}", local_config.display(), e),
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskgrid").join("taskgrid.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to load config from {}: {}", user_config.display(), e),
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Heartbeat and task-timeout knobs for the orchestrator (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub bind_addr: String,
    #[serde(rename = "heartbeat-timeout-secs")]
    pub heartbeat_timeout_secs: u64,
    #[serde(rename = "sweep-interval-secs")]
    pub sweep_interval_secs: u64,
    #[serde(rename = "task-timeout-secs")]
    pub task_timeout_secs: u64,
    #[serde(rename = "timeout-sweep-interval-secs")]
    pub timeout_sweep_interval_secs: u64,
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            heartbeat_timeout_secs: 60,
            sweep_interval_secs: 1,
            task_timeout_secs: 300,
            timeout_sweep_interval_secs: 5,
            max_attempts: 3,
        }
    }
}

/// One entry in the ordered provider list (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_id: String,
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
    #[serde(rename = "base-url")]
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmFallbackConfig {
    pub providers: Vec<ProviderConfig>,
    #[serde(rename = "max-retries-per-provider")]
    pub max_retries_per_provider: u32,
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
    #[serde(rename = "congress-threshold-repeated-error")]
    pub congress_threshold_repeated_error: u32,
    #[serde(rename = "congress-threshold-failures")]
    pub congress_threshold_failures: u64,
    #[serde(rename = "max-consecutive-failures")]
    pub max_consecutive_failures: u32,
    #[serde(rename = "error-history-len")]
    pub error_history_len: usize,
    #[serde(rename = "stale-after-secs")]
    pub stale_after_secs: i64,
}

impl Default for LlmFallbackConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig {
                    provider_id: "primary".to_string(),
                    api_key_env: "TASKGRID_PRIMARY_API_KEY".to_string(),
                    base_url: "https://api.primary.example/v1/chat".to_string(),
                    model: "default".to_string(),
                },
                ProviderConfig {
                    provider_id: "secondary".to_string(),
                    api_key_env: "TASKGRID_SECONDARY_API_KEY".to_string(),
                    base_url: "https://api.secondary.example/v1/chat".to_string(),
                    model: "default".to_string(),
                },
            ],
            max_retries_per_provider: 2,
            retry_delay_ms: 200,
            congress_threshold_repeated_error: 5,
            congress_threshold_failures: 10,
            max_consecutive_failures: 5,
            error_history_len: 50,
            stale_after_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveManagerConfig {
    #[serde(rename = "health-check-interval-secs")]
    pub health_check_interval_secs: u64,
    #[serde(rename = "slave-dead-threshold-secs")]
    pub slave_dead_threshold_secs: i64,
    #[serde(rename = "max-consecutive-health-failures")]
    pub max_consecutive_health_failures: u32,
    #[serde(rename = "execute-timeout-secs")]
    pub execute_timeout_secs: u64,
    #[serde(rename = "auto-update-grace-secs")]
    pub auto_update_grace_secs: u64,
}

impl Default for SlaveManagerConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 15,
            slave_dead_threshold_secs: 90,
            max_consecutive_health_failures: 3,
            execute_timeout_secs: 300,
            auto_update_grace_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.orchestrator.heartbeat_timeout_secs, 60);
        assert_eq!(config.llm.max_retries_per_provider, 2);
        assert_eq!(config.slaves.execute_timeout_secs, 300);
    }

    #[test]
    fn loads_yaml_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "orchestrator:\n  heartbeat-timeout-secs: 120\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.orchestrator.heartbeat_timeout_secs, 120);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.llm.max_retries_per_provider, 2);
    }
}
