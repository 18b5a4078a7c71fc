//! Worker protocol endpoints, slave side (spec §4.4). Bearer-token auth
//! guards every route, grounded in `tasker-orchestration`'s auth
//! interceptor pattern.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Router, extract::Request};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::process::Command;
use tracing::warn;

use crate::version::MasterVersion;

use super::error::AuthError;

/// Hard cap on stdout/stderr capture; beyond this the tail is kept and a
/// truncation flag set (spec §4.4).
const OUTPUT_CAP_BYTES: usize = 1024 * 1024;

pub struct SlaveServerState {
    pub auth_token: String,
    pub execution_methods: Vec<&'static str>,
    pub default_timeout: Duration,
}

pub fn router(state: Arc<SlaveServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/version", get(version))
        .route("/api/execute", post(execute))
        .route("/api/restart", post(restart))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

async fn auth_middleware(State(state): State<Arc<SlaveServerState>>, headers: HeaderMap, request: Request, next: Next) -> Result<Response, AuthError> {
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == state.auth_token => Ok(next.run(request).await),
        _ => Err(AuthError),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    runtime: String,
    execution_methods: Vec<&'static str>,
    version: String,
    commit: String,
    branch: String,
}

async fn health(State(state): State<Arc<SlaveServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        runtime: format!("rustc {}", option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")),
        execution_methods: state.execution_methods.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: crate::version::COMMIT.to_string(),
        branch: crate::version::BRANCH.to_string(),
    })
}

#[derive(Serialize)]
struct VersionResponse {
    version: String,
    commit: String,
    branch: String,
}

async fn version(State(_state): State<Arc<SlaveServerState>>) -> Json<VersionResponse> {
    let v = MasterVersion::capture();
    Json(VersionResponse { version: v.version, commit: v.commit, branch: v.branch })
}

/// Triggers the auto-update restart step (spec §4.3). The process exits
/// shortly after responding so that whatever supervises it (docker, systemd)
/// brings it back up on the freshly pulled/rebuilt commit.
async fn restart(State(_state): State<Arc<SlaveServerState>>) -> Json<serde_json::Value> {
    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::process::exit(0);
    });
    Json(json!({"status": "restarting"}))
}

#[derive(Deserialize)]
struct ExecuteRequest {
    command: String,
    working_dir: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Serialize)]
struct ExecuteResponse {
    success: bool,
    stdout: String,
    stderr: String,
    exit_code: i32,
    method: &'static str,
    stdout_truncated: bool,
    stderr_truncated: bool,
}

fn cap_output(bytes: Vec<u8>) -> (String, bool) {
    if bytes.len() <= OUTPUT_CAP_BYTES {
        (String::from_utf8_lossy(&bytes).into_owned(), false)
    } else {
        let tail = &bytes[bytes.len() - OUTPUT_CAP_BYTES..];
        (String::from_utf8_lossy(tail).into_owned(), true)
    }
}

async fn execute(State(state): State<Arc<SlaveServerState>>, Json(req): Json<ExecuteRequest>) -> Result<Json<ExecuteResponse>, (StatusCode, Json<serde_json::Value>)> {
    let method = state.execution_methods.first().copied().unwrap_or("native");
    let timeout = req.timeout_secs.map(Duration::from_secs).unwrap_or(state.default_timeout);

    let child = Command::new("sh")
        .arg("-c")
        .arg(&req.command)
        .current_dir(&req.working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(error = %e, "failed to spawn execution command");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": "error", "reason": "spawn_failed", "message": e.to_string()}))));
        }
        Err(_) => {
            return Err((StatusCode::REQUEST_TIMEOUT, Json(json!({"status": "error", "reason": "command_timeout"}))));
        }
    };

    let (stdout, stdout_truncated) = cap_output(output.stdout);
    let (stderr, stderr_truncated) = cap_output(output.stderr);

    Ok(Json(ExecuteResponse {
        success: true,
        stdout,
        stderr,
        exit_code: output.status.code().unwrap_or(-1),
        method,
        stdout_truncated,
        stderr_truncated,
    }))
}
