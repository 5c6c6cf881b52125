use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// How a failure should be treated by whoever observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Caller input is malformed. Terminal, never retried.
    Validation,
    /// The request is well formed but refused (e.g. slot unavailable). Terminal.
    BusinessRejection,
    /// Store, oracle or fabric unreachable or slow. Must be retried.
    Transient,
    /// A message references state that does not exist. Logged and dropped.
    DataIntegrity,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

/// Failure of a call that leaves the process. Timeouts are kept apart from
/// explicit failures; both are retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfraError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("{operation} failed: {reason}")]
    Unavailable { operation: String, reason: String },
}

impl InfraError {
    pub fn unavailable(operation: impl Into<String>, reason: impl ToString) -> Self {
        InfraError::Unavailable {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, InfraError::Timeout { .. })
    }

    pub fn class(&self) -> ErrorClass {
        ErrorClass::Transient
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Conflict { code, .. } => *code,
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl From<InfraError> for AppError {
    fn from(err: InfraError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict { message, .. } => (StatusCode::CONFLICT, message),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::warn!("Error: {}: {}", status, message);
        }

        let body = Json(json!({
            "success": false,
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
