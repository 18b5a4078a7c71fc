//! Slave manager and remote execution protocol errors (spec §4.3, §4.4).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlaveError {
    #[error("unknown slave: {0}")]
    UnknownSlave(String),

    #[error("slave {0} has a version mismatch with master")]
    VersionMismatch(String),

    #[error("slave {0} is not online")]
    NotOnline(String),

    #[error("slave {0} unreachable: {1}")]
    Unreachable(String, String),

    #[error("unexpected response from slave {0}: {1}")]
    BadResponse(String, String),
}

impl SlaveError {
    pub fn reason(&self) -> &'static str {
        match self {
            SlaveError::UnknownSlave(_) => "unknown_slave",
            SlaveError::VersionMismatch(_) => "version_mismatch",
            SlaveError::NotOnline(_) => "not_online",
            SlaveError::Unreachable(_, _) => "unreachable",
            SlaveError::BadResponse(_, _) => "bad_response",
        }
    }
}

impl IntoResponse for SlaveError {
    fn into_response(self) -> Response {
        let status = match self {
            SlaveError::UnknownSlave(_) => StatusCode::NOT_FOUND,
            SlaveError::VersionMismatch(_) | SlaveError::NotOnline(_) => StatusCode::CONFLICT,
            SlaveError::Unreachable(_, _) | SlaveError::BadResponse(_, _) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(json!({ "status": "error", "reason": self.reason(), "message": self.to_string() }));
        (status, body).into_response()
    }
}

/// Auth failures for the slave-side HTTP surface (spec §4.4, §6: bad/missing
/// bearer token → 401).
#[derive(Debug, Error)]
#[error("missing or invalid bearer token")]
pub struct AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(json!({ "status": "error", "reason": "unauthorized" }))).into_response()
    }
}
