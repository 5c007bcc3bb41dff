//! Health check endpoints for Kubernetes probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::AppState;

/// Readiness details.
#[derive(Debug, Serialize)]
pub struct ReadinessStatus {
    /// "ready" or "not_ready"
    pub status: &'static str,
    /// SP metadata renders (key material and IdP metadata are usable).
    pub saml: bool,
    /// An upstream is configured for permitted requests.
    pub upstream_configured: bool,
}

/// Kubernetes liveness probe.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Kubernetes readiness probe.
///
/// Returns 200 once the SAML engine can produce metadata, 503 otherwise.
#[tracing::instrument(name = "health.readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let saml = match state.gatekeeper.metadata() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed: SP metadata unavailable");
            false
        }
    };

    let status = if saml {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessStatus {
            status: if saml { "ready" } else { "not_ready" },
            saml,
            upstream_configured: state.config.upstream.url.is_some(),
        }),
    )
}
