//! End-to-end scenarios over HTTP, mirroring the literal examples used to
//! validate the orchestrator and slave protocol.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use taskgrid::domain::Payload;
use taskgrid::orchestrator::Orchestrator;
use taskgrid::slave::{InstallMethod, SlaveClient, SlaveServerState, slave_router};

async fn spawn_router(router: axum::Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn basic_dispatch_over_http() {
    let orchestrator = Arc::new(Orchestrator::new(Default::default(), std::env::temp_dir().join("taskgrid-it-basic")));
    let app = taskgrid::orchestrator::router(orchestrator);
    let addr = spawn_router(app).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let register: Value = client
        .post(format!("{base}/api/workers/register"))
        .json(&json!({"worker_type": "groq", "capabilities": ["groq"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let worker_id = register["worker_id"].as_str().unwrap().to_string();

    let submit: Value = client
        .post(format!("{base}/api/tasks/submit"))
        .json(&json!({
            "payload": {"type": "llm_chat", "data": {"messages": []}},
            "priority": 5,
            "required_capabilities": ["groq"]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = submit["task_id"].as_str().unwrap().to_string();

    let polled: Value = client.get(format!("{base}/api/workers/{worker_id}/tasks")).send().await.unwrap().json().await.unwrap();
    assert_eq!(polled["task"]["task_id"], task_id);

    client
        .post(format!("{base}/api/workers/{worker_id}/result"))
        .json(&json!({"task_id": task_id, "result": {"ok": true, "text": "hello"}}))
        .send()
        .await
        .unwrap();

    let status: Value = client.get(format!("{base}/api/tasks/status/{task_id}")).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["status"], "completed");
    assert_eq!(status["result"]["text"], "hello");
}

#[tokio::test]
async fn capability_mismatch_over_http() {
    let orchestrator = Arc::new(Orchestrator::new(Default::default(), std::env::temp_dir().join("taskgrid-it-mismatch")));
    let mut gemini = BTreeSet::new();
    gemini.insert("gemini".to_string());
    let worker_id = orchestrator.register_worker("gemini", gemini).await;

    let mut required = BTreeSet::new();
    required.insert("groq".to_string());
    let task_id = orchestrator
        .submit_task(Payload::LlmChat { messages: vec![], options: Value::Null }, 5, required)
        .await;

    let polled = orchestrator.poll_task(&worker_id).await.unwrap();
    assert!(polled.is_none());

    let status = orchestrator.get_status(&task_id).await.unwrap();
    assert_eq!(status.status, taskgrid::domain::TaskStatus::Pending);
}

#[tokio::test]
async fn slave_round_trip_health_version_execute() {
    let state = Arc::new(SlaveServerState {
        auth_token: "secret-token".to_string(),
        execution_methods: vec!["native"],
        default_timeout: Duration::from_secs(5),
    });
    let addr = spawn_router(slave_router(state)).await;

    let mut slave = taskgrid::slave::Slave::new("shell_slave", addr.ip().to_string(), addr.port(), "secret-token", InstallMethod::Native);
    let client = SlaveClient::new();

    let health = client.health(&slave).await.unwrap();
    assert_eq!(health.status, "ok");
    assert!(!health.commit.is_empty());

    slave.worker.status = taskgrid::domain::WorkerStatus::Online;
    let result = client.execute(&slave, "echo hello", "/tmp", Duration::from_secs(5)).await.unwrap();
    assert!(result.success);
    assert_eq!(result.stdout.trim(), "hello");
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn slave_rejects_wrong_bearer_token() {
    let state = Arc::new(SlaveServerState {
        auth_token: "right-token".to_string(),
        execution_methods: vec!["native"],
        default_timeout: Duration::from_secs(5),
    });
    let addr = spawn_router(slave_router(state)).await;

    let slave = taskgrid::slave::Slave::new("shell_slave", addr.ip().to_string(), addr.port(), "wrong-token", InstallMethod::Native);
    let client = SlaveClient::new();

    let err = client.health(&slave).await.unwrap_err();
    assert!(matches!(err, taskgrid::slave::SlaveError::BadResponse(_, _)));
}

/// A minimal mock slave that reports a stale commit until its `/api/execute`
/// is invoked once, then reports the real master commit — standing in for a
/// slave that has pulled and rebuilt during auto-update.
fn mock_update_router() -> (axum::Router, Arc<std::sync::atomic::AtomicBool>) {
    use axum::Json;
    use axum::extract::State;
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicBool, Ordering};

    let updated = Arc::new(AtomicBool::new(false));

    async fn health(State(updated): State<Arc<AtomicBool>>) -> Json<Value> {
        let commit = if updated.load(Ordering::SeqCst) { taskgrid::version::COMMIT.to_string() } else { "stale-commit-before-pull".to_string() };
        Json(json!({"status": "ok", "execution_methods": ["native"], "version": "0.0.0", "commit": commit, "branch": "main"}))
    }

    async fn execute(State(updated): State<Arc<AtomicBool>>, Json(_req): Json<Value>) -> Json<Value> {
        updated.store(true, Ordering::SeqCst);
        Json(json!({"success": true, "stdout": "", "stderr": "", "exit_code": 0, "method": "native"}))
    }

    async fn restart(State(_updated): State<Arc<AtomicBool>>) -> Json<Value> {
        Json(json!({"status": "restarting"}))
    }

    let router = axum::Router::new()
        .route("/api/health", get(health))
        .route("/api/execute", post(execute))
        .route("/api/restart", post(restart))
        .with_state(updated.clone());
    (router, updated)
}

#[tokio::test]
async fn version_mismatch_refuses_execution_via_manager() {
    use taskgrid::config::SlaveManagerConfig;
    use taskgrid::notify::TracingNotifier;
    use taskgrid::slave::SlaveManager;
    use taskgrid::version::MasterVersion;

    let (router, _updated) = mock_update_router();
    let addr = spawn_router(router).await;

    let data_dir = std::env::temp_dir().join("taskgrid-it-mismatch-refuse");
    let _ = std::fs::remove_dir_all(&data_dir);
    let manager = SlaveManager::new(SlaveManagerConfig::default(), Arc::new(TracingNotifier), MasterVersion::capture(), data_dir);

    let slave_id = manager.register_slave("shell_slave", addr.ip().to_string(), addr.port(), "secret-token", InstallMethod::Native).await.unwrap();

    let err = manager.execute_on_slave(&slave_id, "echo hi", "/tmp", Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, taskgrid::slave::SlaveError::VersionMismatch(_)));
}

#[tokio::test]
async fn auto_update_resolves_version_mismatch() {
    use taskgrid::config::SlaveManagerConfig;
    use taskgrid::notify::TracingNotifier;
    use taskgrid::slave::SlaveManager;
    use taskgrid::version::MasterVersion;

    let (router, _updated) = mock_update_router();
    let addr = spawn_router(router).await;

    let data_dir = std::env::temp_dir().join("taskgrid-it-auto-update");
    let _ = std::fs::remove_dir_all(&data_dir);
    let config = SlaveManagerConfig { auto_update_grace_secs: 0, ..SlaveManagerConfig::default() };
    let manager = SlaveManager::new(config, Arc::new(TracingNotifier), MasterVersion::capture(), data_dir);

    let slave_id = manager.register_slave("shell_slave", addr.ip().to_string(), addr.port(), "secret-token", InstallMethod::Native).await.unwrap();
    assert!(manager.execute_on_slave(&slave_id, "echo hi", "/tmp", Duration::from_secs(5)).await.is_err());

    let resolved = manager.auto_update_slave(&slave_id).await.unwrap();
    assert!(resolved, "auto-update should have reached the mismatched slave and converged its commit");

    manager.execute_on_slave(&slave_id, "echo hi", "/tmp", Duration::from_secs(5)).await.unwrap();
}
