//! Background liveness loops (spec §4.1), grounded in the teacher's
//! `watcher::main_watcher::MainWatcher` periodic-poll pattern.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::core::Orchestrator;

/// Spawn the heartbeat and task-timeout sweepers as independent background
/// tasks. Returns their join handles so callers can await them at shutdown.
pub fn spawn_sweepers(orchestrator: Arc<Orchestrator>, heartbeat_interval: Duration, timeout_interval: Duration) -> Vec<tokio::task::JoinHandle<()>> {
    let hb_orch = orchestrator.clone();
    let hb_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        loop {
            ticker.tick().await;
            debug!("running heartbeat sweep");
            hb_orch.sweep_heartbeats().await;
        }
    });

    let timeout_orch = orchestrator.clone();
    let timeout_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(timeout_interval);
        loop {
            ticker.tick().await;
            debug!("running task timeout sweep");
            timeout_orch.sweep_timeouts().await;
        }
    });

    vec![hb_handle, timeout_handle]
}
