//! Orchestrator-facing error type (spec §7, protocol errors).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("unknown worker: {0}")]
    UnknownWorker(String),

    #[error("task {task_id} is not assigned to worker {worker_id}")]
    WrongWorker { task_id: String, worker_id: String },

    #[error("unknown task: {0}")]
    TaskNotFound(String),

    #[error("task {0} is already terminal")]
    AlreadyTerminal(String),

    #[error("orchestrator is shutting down")]
    ShuttingDown,
}

impl OrchestratorError {
    /// Machine-readable reason string surfaced to HTTP callers (spec §7).
    pub fn reason(&self) -> &'static str {
        match self {
            OrchestratorError::UnknownWorker(_) => "unknown_worker",
            OrchestratorError::WrongWorker { .. } => "wrong_worker",
            OrchestratorError::TaskNotFound(_) => "task_not_found",
            OrchestratorError::AlreadyTerminal(_) => "already_terminal",
            OrchestratorError::ShuttingDown => "shutting_down",
        }
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match self {
            OrchestratorError::UnknownWorker(_) | OrchestratorError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::WrongWorker { .. } | OrchestratorError::AlreadyTerminal(_) => StatusCode::CONFLICT,
            OrchestratorError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(json!({
            "status": "error",
            "reason": self.reason(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
