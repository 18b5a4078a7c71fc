//! Provider adapter boundary (spec §4.2).
//!
//! Wire-protocol fidelity for any specific vendor is out of scope (spec §1
//! non-goals, "LLM prompt engineering quality"); this trait is the seam a
//! real adapter would fill in, following the teacher's `llm::create_client`
//! factory pattern of dispatching on a provider name.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProviderConfig;

use super::error::ProviderError;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn chat(&self, messages: &[Value], options: &Value) -> Result<Value, ProviderError>;
}

/// A minimal `reqwest`-based adapter posting `{messages, options}` to the
/// provider's configured `base_url` and expecting a JSON body back.
pub struct HttpProviderAdapter {
    client: reqwest::Client,
    config: ProviderConfig,
    api_key: Option<String>,
}

impl HttpProviderAdapter {
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        Self { client, config, api_key }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    async fn chat(&self, messages: &[Value], options: &Value) -> Result<Value, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::Auth("missing credentials".to_string()))?;

        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(api_key)
            .json(&serde_json::json!({ "model": self.config.model, "messages": messages, "options": options }))
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(e) })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        response.json::<Value>().await.map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
