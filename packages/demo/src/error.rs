//! Application-level error types.
//!
//! [`AppError`] is what handlers return; every variant serialises to an
//! [`ErrorResponse`] body with a matching HTTP status. [`DemoError`] covers
//! start-up and CLI failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use selfkey_agent::identifier::DidManagerError;
use selfkey_agent::storage::StorageError;
use selfkey_agent::AgentError;

use crate::config::ConfigError;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// An error that a handler can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    UnprocessableEntity(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_parameter", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "verification_failed", msg)
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl From<AgentError> for AppError {
    fn from(e: AgentError) -> Self {
        if e.is_not_found() {
            return AppError::NotFound(e.to_string());
        }
        let msg = e.to_string();
        match e {
            AgentError::DidManager(DidManagerError::Conflict(_))
            | AgentError::Storage(StorageError::Conflict(_)) => AppError::Conflict(msg),
            AgentError::Verification(_) => AppError::UnprocessableEntity(msg),
            AgentError::InvalidDid(_)
            | AgentError::Parameters(_)
            | AgentError::IssuerNotManaged(_)
            | AgentError::HolderNotDefined
            | AgentError::UnsupportedProofFormat(_)
            | AgentError::InvalidCredential
            | AgentError::InvalidPresentation
            | AgentError::UnsupportedMessage
            | AgentError::Credential(_)
            | AgentError::Jwt(_)
            | AgentError::DidManager(DidManagerError::UnsupportedProvider(_))
            | AgentError::DidManager(DidManagerError::AliasRequired(_))
            | AgentError::DidManager(DidManagerError::ServiceNotFound { .. }) => {
                AppError::BadRequest(msg)
            }
            _ => AppError::Internal(msg),
        }
    }
}

/// Failures while starting a server or running a CLI command.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("failed to open SQLite database at {path}: {reason}")]
    Database { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
