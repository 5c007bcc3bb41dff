//! SAML endpoints: SP metadata and the assertion consumer service.

use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::header,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    AppState,
    auth::{AcsForm, AuthError},
};

/// SP metadata for the IdP to consume.
#[tracing::instrument(name = "saml.metadata", skip(state))]
pub async fn saml_metadata(State(state): State<AppState>) -> Result<Response, AuthError> {
    let metadata = state.gatekeeper.metadata().map_err(|e| {
        tracing::error!(error = %e, "Failed to render SP metadata");
        AuthError::Internal(e.to_string())
    })?;

    Ok((
        [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
        metadata,
    )
        .into_response())
}

/// Assertion consumer service (HTTP-POST binding).
///
/// Receives the SAML response from the IdP, consumes the matching relay
/// state, issues the session cookie and redirects to the original URI.
#[tracing::instrument(name = "saml.acs", skip(state, cookies, form))]
pub async fn saml_acs(
    State(state): State<AppState>,
    cookies: Cookies,
    form: Result<Form<AcsForm>, FormRejection>,
) -> Result<Response, AuthError> {
    let Form(form) =
        form.map_err(|e| AuthError::Forbidden(format!("unreadable assertion form: {e}")))?;

    state.gatekeeper.consume_assertion(&cookies, form).await
}
