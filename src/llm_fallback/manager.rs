//! The fallback manager: ordered provider attempts, cooldowns, escalation
//! (spec §4.2). Mutex discipline follows spec §5: the guard is dropped for
//! the duration of each network call and re-acquired only to read/update
//! provider state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::LlmFallbackConfig;
use crate::notify::Notifier;

use super::client::ProviderAdapter;
use super::error::ErrorKind;
use super::escalation::{ErrorEntry, EscalationRecord};
use super::persistence::FallbackState;
use super::provider::ProviderState;

struct ManagerState {
    providers: HashMap<String, ProviderState>,
    error_history: Vec<ErrorEntry>,
    repeated_kind: Option<ErrorKind>,
    repeated_count: u32,
    total_failures: u64,
}

pub struct FallbackManager {
    config: LlmFallbackConfig,
    order: Vec<String>,
    adapters: HashMap<String, Box<dyn ProviderAdapter>>,
    state: Mutex<ManagerState>,
    notifier: Arc<dyn Notifier>,
    data_dir: PathBuf,
}

/// Result of a `chat` call: either a provider's response and which provider
/// answered, or the failure sentinel after escalation (spec §4.2).
pub enum ChatOutcome {
    Answered { response: Value, provider_id: String },
    Failed,
}

impl FallbackManager {
    pub fn new(config: LlmFallbackConfig, adapters: HashMap<String, Box<dyn ProviderAdapter>>, notifier: Arc<dyn Notifier>, data_dir: PathBuf) -> Self {
        let order: Vec<String> = config.providers.iter().map(|p| p.provider_id.clone()).collect();

        let state_path = data_dir.join("llm_fallback").join("fallback_state.json");
        let restored = FallbackState::load(&state_path, config.stale_after_secs).ok().flatten();

        let mut providers = HashMap::new();
        for id in &order {
            let state = restored
                .as_ref()
                .and_then(|s| s.providers.iter().find(|p| &p.provider_id == id).cloned())
                .unwrap_or_else(|| ProviderState::new(id.clone()));
            providers.insert(id.clone(), state);
        }
        let error_history = restored.map(|s| s.error_history).unwrap_or_default();

        Self {
            config,
            order,
            adapters,
            state: Mutex::new(ManagerState { providers, error_history, repeated_kind: None, repeated_count: 0, total_failures: 0 }),
            notifier,
            data_dir,
        }
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join("llm_fallback").join("fallback_state.json")
    }

    fn escalation_path(&self, record: &EscalationRecord) -> PathBuf {
        self.data_dir.join("llm_fallback").join(record.file_name())
    }

    async fn persist(&self) {
        let guard = self.state.lock().await;
        let snapshot = FallbackState {
            providers: self.order.iter().filter_map(|id| guard.providers.get(id).cloned()).collect(),
            error_history: guard.error_history.clone(),
            saved_at: Utc::now(),
        };
        drop(guard);
        if let Err(e) = snapshot.save(&self.state_path()) {
            warn!(error = %e, "failed to persist fallback state");
        }
    }

    pub async fn provider_snapshots(&self) -> Vec<ProviderState> {
        let guard = self.state.lock().await;
        self.order.iter().filter_map(|id| guard.providers.get(id).cloned()).collect()
    }

    /// Present a single `chat` contract across every configured provider
    /// (spec §4.2).
    pub async fn chat(&self, context: &str, messages: &[Value], options: &Value) -> ChatOutcome {
        for provider_id in &self.order {
            let now = Utc::now();
            let selectable = {
                let guard = self.state.lock().await;
                guard.providers.get(provider_id).map(|p| p.is_selectable(now)).unwrap_or(false)
            };
            if !selectable {
                continue;
            }

            let Some(adapter) = self.adapters.get(provider_id) else { continue };

            let mut last_kind = None;
            for attempt in 0..=self.config.max_retries_per_provider {
                match adapter.chat(messages, options).await {
                    Ok(response) => {
                        let mut guard = self.state.lock().await;
                        if let Some(p) = guard.providers.get_mut(provider_id) {
                            p.record_success();
                        }
                        guard.repeated_count = 0;
                        guard.repeated_kind = None;
                        drop(guard);
                        self.persist().await;
                        info!(provider_id, "chat request succeeded");
                        return ChatOutcome::Answered { response, provider_id: provider_id.clone() };
                    }
                    Err(err) => {
                        let kind = err.kind();
                        last_kind = Some(kind);

                        // Every failed attempt counts against consecutive_failures
                        // (spec §8: two failed attempts in one call -> consecutive_failures == 2),
                        // so the adaptive cooldown reflects the full attempt count, not just
                        // the final provider-exhaustion event.
                        let mut guard = self.state.lock().await;
                        if let Some(p) = guard.providers.get_mut(provider_id) {
                            p.record_failure(kind, self.config.max_consecutive_failures, Utc::now());
                        }
                        drop(guard);

                        if attempt < self.config.max_retries_per_provider {
                            tokio::time::sleep(std::time::Duration::from_millis(self.config.retry_delay_ms)).await;
                        }
                    }
                }
            }

            let kind = last_kind.unwrap_or(ErrorKind::Unknown);
            let should_escalate_now = {
                let mut guard = self.state.lock().await;
                guard.total_failures += 1;
                guard.error_history.push(ErrorEntry { provider_id: provider_id.clone(), kind, at: now });
                if guard.error_history.len() > self.config.error_history_len {
                    let overflow = guard.error_history.len() - self.config.error_history_len;
                    guard.error_history.drain(0..overflow);
                }

                if guard.repeated_kind == Some(kind) {
                    guard.repeated_count += 1;
                } else {
                    guard.repeated_kind = Some(kind);
                    guard.repeated_count = 1;
                }

                guard.repeated_count >= self.config.congress_threshold_repeated_error
                    || guard.total_failures >= self.config.congress_threshold_failures
            };
            self.persist().await;
            warn!(provider_id, ?kind, "provider attempt exhausted");

            if should_escalate_now {
                self.escalate(context).await;
                return ChatOutcome::Failed;
            }
        }

        self.escalate(context).await;
        ChatOutcome::Failed
    }

    async fn escalate(&self, context: &str) {
        let guard = self.state.lock().await;
        let providers = self.order.iter().filter_map(|id| guard.providers.get(id).cloned()).collect();
        let error_history = guard.error_history.clone();
        drop(guard);

        let record = EscalationRecord::new(context, providers, error_history);
        let path = self.escalation_path(&record);
        if let Err(e) = crate::persistence::write_json_atomic(&path, &record) {
            warn!(error = %e, "failed to write escalation record");
        }
        self.notifier.notify(&format!("llm fallback escalation: {context}")).await;
    }
}
