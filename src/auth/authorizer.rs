//! Assertion consumer: turns a validated SAML response into a session.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_cookies::Cookies;

use super::{
    AuthError, Gatekeeper,
    claims::{Attributes, RelayStateClaims, SessionClaims},
    engine::Assertion,
};

/// Form posted by the IdP to the assertion consumer service.
#[derive(Debug, Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState", default)]
    pub relay_state: Option<String>,
}

impl Gatekeeper {
    /// Handle an IdP POST to the assertion consumer service.
    ///
    /// On success the response sets the session cookie and redirects to the
    /// URI the user originally asked for. Every failure is a 403 and no
    /// session is issued.
    pub async fn consume_assertion(
        &self,
        cookies: &Cookies,
        form: AcsForm,
    ) -> Result<Response, AuthError> {
        // Snapshot before the relay state below is consumed: the IdP may be
        // answering any login this browser has in flight.
        let possible_request_ids = self.possible_request_ids(cookies);

        let redirect_uri = match form.relay_state.as_deref().filter(|r| !r.is_empty()) {
            Some(relay_id) => self.take_relay_state(cookies, relay_id)?.uri,
            None => "/".to_string(),
        };

        let assertion = self
            .engine
            .parse_response(&form.saml_response, &possible_request_ids)
            .await
            .map_err(|e| {
                tracing::warn!(
                    response = %e.response,
                    now = %e.now,
                    cause = %e.cause,
                    "Rejected SAML response"
                );
                AuthError::Forbidden(format!("invalid SAML response: {}", e.cause))
            })?;

        let subject = assertion.subject.clone();
        let claims = SessionClaims::new(
            assertion.subject.clone(),
            self.entity_id(),
            flatten_attributes(&assertion),
            self.session.duration_secs,
        );
        self.issue_session(cookies, &claims)?;

        tracing::info!(
            subject = subject.as_deref().unwrap_or(""),
            attributes = claims.attr.len(),
            "SAML login succeeded"
        );

        let location = HeaderValue::try_from(safe_redirect_target(&redirect_uri))
            .map_err(|e| AuthError::Internal(format!("invalid redirect location: {e}")))?;
        Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
    }

    /// Request IDs of every login in flight for this browser, plus the empty
    /// ID when unsolicited responses are accepted.
    fn possible_request_ids(&self, cookies: &Cookies) -> Vec<String> {
        let mut ids: Vec<String> = self
            .relay_state
            .get_all(cookies)
            .iter()
            .filter_map(
                |token| match self.codec.verify::<RelayStateClaims>(token, None) {
                    Ok(claims) => Some(claims.id),
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping invalid relay state");
                        None
                    }
                },
            )
            .collect();
        if self.allow_idp_initiated {
            ids.push(String::new());
        }
        ids
    }

    /// Verify and consume the relay state stored under `relay_id`.
    fn take_relay_state(
        &self,
        cookies: &Cookies,
        relay_id: &str,
    ) -> Result<RelayStateClaims, AuthError> {
        let token = self
            .relay_state
            .get_one(cookies, relay_id)
            .ok_or_else(|| AuthError::Forbidden("relay state cookie not presented".into()))?;
        let claims = self
            .codec
            .verify::<RelayStateClaims>(&token, None)
            .map_err(|e| AuthError::Forbidden(format!("invalid relay state: {e}")))?;
        self.relay_state.delete(cookies, relay_id);
        Ok(claims)
    }
}

/// Merge all attribute statements into one map keyed by friendly name
/// (falling back to name). Values of repeated keys accumulate.
pub fn flatten_attributes(assertion: &Assertion) -> Attributes {
    let mut attributes = Attributes::new();
    for statement in &assertion.attribute_statements {
        for attribute in &statement.attributes {
            attributes
                .entry(attribute.key().to_string())
                .or_default()
                .extend(attribute.values.iter().cloned());
        }
    }
    attributes
}

/// Only same-origin relative paths are honoured; anything else goes to `/`.
fn safe_redirect_target(uri: &str) -> &str {
    if uri.starts_with('/') && !uri.starts_with("//") && !uri.starts_with("/\\") {
        uri
    } else {
        "/"
    }
}
