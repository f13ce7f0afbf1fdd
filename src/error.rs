use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Convenience type alias for Results with FleetError
pub type Result<T> = std::result::Result<T, FleetError>;

/// Main error type for the fleet control plane
///
/// Mirrors the error taxonomy the control plane is built around: client
/// mistakes, missing entities, illegal state transitions, auth failures,
/// rate limiting, and retryable/fatal infrastructure errors.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Fatal invariant violation: {0}")]
    Fatal(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FleetError {
    /// Maps to the HTTP status contract described in spec §6.
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            FleetError::Validation(_) | FleetError::Serialization(_) => StatusCode::BAD_REQUEST,
            FleetError::Unauthorized => StatusCode::UNAUTHORIZED,
            FleetError::Forbidden(_) => StatusCode::FORBIDDEN,
            FleetError::NotFound(_) => StatusCode::NOT_FOUND,
            FleetError::Conflict(_) => StatusCode::CONFLICT,
            FleetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FleetError::Config(_)
            | FleetError::Transient(_)
            | FleetError::Fatal(_)
            | FleetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if matches!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self, "request failed with internal error");
        }
        let mut response = axum::Json(json!({ "error": self.to_string() })).into_response();
        *response.status_mut() = status;
        if let FleetError::RateLimited { retry_after_secs } = self {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_str(&retry_after_secs.to_string()).unwrap(),
            );
        }
        response
    }
}
