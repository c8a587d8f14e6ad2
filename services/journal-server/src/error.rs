//! Error taxonomy for the journal core and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Journal error types
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Malformed or missing input; nothing was written
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Webhook secret missing or wrong
    #[error("unauthorized")]
    Unauthorized,

    /// Reserved for optimistic concurrency
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage hiccup; the whole operation is safe to retry
    #[error("storage unavailable: {0}")]
    Transient(String),
}

impl JournalError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        JournalError::NotFound { kind, id: id.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            JournalError::Validation(_) => StatusCode::BAD_REQUEST,
            JournalError::NotFound { .. } => StatusCode::NOT_FOUND,
            JournalError::Unauthorized => StatusCode::UNAUTHORIZED,
            JournalError::Conflict(_) => StatusCode::CONFLICT,
            JournalError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<sqlx::Error> for JournalError {
    fn from(e: sqlx::Error) -> Self {
        JournalError::Transient(e.to_string())
    }
}

impl From<validator::ValidationErrors> for JournalError {
    fn from(e: validator::ValidationErrors) -> Self {
        JournalError::Validation(e.to_string())
    }
}

impl IntoResponse for JournalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, JournalError>;
