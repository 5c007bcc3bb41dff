use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Request-path failures of the gatekeeper.
///
/// Reasons are logged but never returned to the client: every 403 looks the
/// same from the outside.
#[derive(Debug)]
pub enum AuthError {
    /// Access forbidden: missing or invalid relay state, rejected assertion,
    /// or an identity that does not satisfy an access rule.
    Forbidden(String),

    /// The request cannot be matched against access rules safely (e.g. a
    /// path with dot segments or needless percent-encoding).
    BadRequest(String),

    /// The gatekeeper is misconfigured for this request (e.g. login initiated
    /// on the assertion consumer path, or the IdP offers no usable binding).
    Configuration(String),

    /// Internal error (token signing, engine failure).
    Internal(String),
}

/// Error body: `{"error": {"type": "...", "message": "...", "code": "..."}}`
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    #[serde(rename = "type")]
    error_type: &'static str,
    message: &'static str,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match &self {
            AuthError::Forbidden(reason) => {
                tracing::info!(reason = %reason, "Request forbidden");
                (
                    StatusCode::FORBIDDEN,
                    "permission_error",
                    "forbidden",
                    "Forbidden",
                )
            }
            AuthError::BadRequest(reason) => {
                tracing::info!(reason = %reason, "Request rejected");
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_request_error",
                    "bad_request",
                    "Bad request",
                )
            }
            AuthError::Configuration(msg) => {
                tracing::error!(error = %msg, "Gatekeeper configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "configuration_error",
                    "Internal server error",
                )
            }
            AuthError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal authentication error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "internal_error",
                    "Internal server error",
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorInfo {
                error_type,
                message,
                code,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AuthError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AuthError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AuthError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}
