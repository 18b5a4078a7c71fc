//! The notification channel external collaborator (spec §6).
//!
//! The real channel (chat ops bot, pager, etc.) is out of core scope; this
//! module defines the interface the Slave Manager and LLM Fallback Manager
//! call through, plus a tracing-backed default so the core works standalone.
//! Delivery is best-effort: failures are logged, never propagated (spec §9,
//! "Escalation delivery guarantees").

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Default notifier: emits a structured tracing event. Stands in for the
/// real external channel described in spec §6.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, message: &str) {
        tracing::warn!(target: "taskgrid::notify", %message, "notification");
    }
}
