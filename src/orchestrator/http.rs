//! HTTP surface for the orchestrator (spec §6).
//!
//! Grounded in `tasker-orchestration`'s axum router (`bin/server.rs`): one
//! `Router` built from handler fns closing over an `Arc<Orchestrator>` state.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{Payload, Priority};

use super::core::Orchestrator;
use super::error::OrchestratorError;

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/workers/register", post(register_worker))
        .route("/api/workers/{worker_id}/heartbeat", post(heartbeat))
        .route("/api/workers/{worker_id}/tasks", get(poll_task))
        .route("/api/workers/{worker_id}/result", post(submit_result))
        .route("/api/tasks/submit", post(submit_task))
        .route("/api/tasks/status/{task_id}", get(get_status))
        .route("/api/tasks/{task_id}/cancel", post(cancel_task))
        .route("/api/workers/list", get(list_workers))
        .with_state(orchestrator)
}

async fn health(State(orch): State<Arc<Orchestrator>>) -> Json<serde_json::Value> {
    let (online_workers, pending_tasks) = orch.health_snapshot().await;
    Json(json!({ "status": "ok", "online_workers": online_workers, "pending_tasks": pending_tasks }))
}

#[derive(Deserialize)]
struct RegisterWorkerRequest {
    worker_type: String,
    #[serde(default)]
    capabilities: BTreeSet<String>,
}

#[derive(Serialize)]
struct RegisterWorkerResponse {
    worker_id: String,
}

async fn register_worker(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<RegisterWorkerRequest>,
) -> Json<RegisterWorkerResponse> {
    let worker_id = orch.register_worker(req.worker_type, req.capabilities).await;
    Json(RegisterWorkerResponse { worker_id })
}

async fn heartbeat(
    State(orch): State<Arc<Orchestrator>>,
    Path(worker_id): Path<String>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    orch.heartbeat(&worker_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn poll_task(
    State(orch): State<Arc<Orchestrator>>,
    Path(worker_id): Path<String>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    let task = orch.poll_task(&worker_id).await?;
    Ok(Json(json!({ "task": task })))
}

#[derive(Deserialize)]
struct SubmitTaskRequest {
    payload: Payload,
    #[serde(default = "default_priority")]
    priority: Priority,
    #[serde(default)]
    required_capabilities: BTreeSet<String>,
}

fn default_priority() -> Priority {
    5
}

#[derive(Serialize)]
struct SubmitTaskResponse {
    task_id: String,
}

async fn submit_task(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<SubmitTaskRequest>,
) -> Json<SubmitTaskResponse> {
    let task_id = orch.submit_task(req.payload, req.priority, req.required_capabilities).await;
    Json(SubmitTaskResponse { task_id })
}

async fn submit_result(
    State(orch): State<Arc<Orchestrator>>,
    Path(worker_id): Path<String>,
    Json(req): Json<SubmitResultRequest>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    orch.submit_result(&req.task_id, &worker_id, req.result).await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Deserialize)]
struct SubmitResultRequest {
    task_id: String,
    result: serde_json::Value,
}

async fn get_status(
    State(orch): State<Arc<Orchestrator>>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    match orch.get_status(&task_id).await {
        Some(task) => Ok(Json(json!(task))),
        None => Err(OrchestratorError::TaskNotFound(task_id)),
    }
}

async fn cancel_task(
    State(orch): State<Arc<Orchestrator>>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    orch.cancel_task(&task_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn list_workers(State(orch): State<Arc<Orchestrator>>) -> Json<serde_json::Value> {
    Json(json!(orch.list_workers().await))
}
