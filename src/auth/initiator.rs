//! Starting a login: AuthnRequest plus relay state, delivered by redirect or
//! auto-submitting form.

use std::io::Write;

use axum::{
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::{Compression, write::DeflateEncoder};
use tower_cookies::Cookies;

use super::{
    AuthError, AuthnRequest, Binding, Gatekeeper, claims::RelayStateClaims,
    relay_state::new_relay_id,
};

/// CSP for the POST binding page. Only the inline submit script below may run.
pub const POST_BINDING_CSP: &str = "default-src; \
    script-src 'sha256-AjPdJSbZmeWHnEc5ykvJFay8FTWeTeRbs9dutfZ0HqE='; \
    reflected-xss block; referrer no-referrer;";

/// Inline script of the POST binding page. Its SHA-256 is pinned in
/// [`POST_BINDING_CSP`]; any change here must update the hash.
const POST_BINDING_SCRIPT: &str = "document.getElementById('SAMLSubmitButton').style.visibility=\"hidden\";document.getElementById('SAMLRequestForm').submit();";

impl Gatekeeper {
    /// Send the user agent to the IdP to log in, remembering `uri` so the
    /// user lands back on it afterwards.
    ///
    /// Must never run on the assertion consumer path: the IdP would post back
    /// to a request that starts another login.
    pub fn require_account(&self, uri: &Uri, cookies: &Cookies) -> Result<Response, AuthError> {
        if uri.path() == self.acs_path {
            return Err(AuthError::Configuration(format!(
                "login cannot be initiated on the assertion consumer path {}",
                self.acs_path
            )));
        }

        let (binding, location) = self
            .engine
            .sso_binding_location(Binding::Redirect)
            .map(|l| (Binding::Redirect, l))
            .or_else(|| {
                self.engine
                    .sso_binding_location(Binding::Post)
                    .map(|l| (Binding::Post, l))
            })
            .ok_or_else(|| {
                AuthError::Configuration(
                    "IdP offers neither an HTTP-Redirect nor an HTTP-POST SSO binding".into(),
                )
            })?;

        let request = self
            .engine
            .make_authentication_request(&location)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let relay_id = new_relay_id();
        let original_uri = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let claims = RelayStateClaims::new(
            request.id.clone(),
            original_uri,
            self.session.relay_state.max_age_secs,
        );
        let token = self
            .codec
            .sign(&claims)
            .map_err(|e| AuthError::Internal(format!("failed to sign relay state: {e}")))?;
        self.relay_state.put(cookies, &relay_id, token);

        tracing::debug!(
            request_id = %request.id,
            binding = ?binding,
            destination = %request.destination,
            "Initiating SAML login"
        );

        match binding {
            Binding::Redirect => redirect_binding(&request, &relay_id),
            Binding::Post => Ok(post_binding(&request, &relay_id)),
        }
    }
}

/// 302 to the IdP with a deflated, base64 `SAMLRequest` and the relay ID.
fn redirect_binding(request: &AuthnRequest, relay_id: &str) -> Result<Response, AuthError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(request.xml.as_bytes())
        .map_err(|e| AuthError::Internal(format!("failed to compress AuthnRequest: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| AuthError::Internal(format!("failed to compress AuthnRequest: {e}")))?;

    let mut url = url::Url::parse(&request.destination).map_err(|e| {
        AuthError::Configuration(format!(
            "IdP SSO location '{}' is not a valid URL: {e}",
            request.destination
        ))
    })?;
    url.query_pairs_mut()
        .append_pair("SAMLRequest", &STANDARD.encode(compressed))
        .append_pair("RelayState", relay_id);

    let location = HeaderValue::try_from(url.as_str())
        .map_err(|e| AuthError::Internal(format!("invalid redirect location: {e}")))?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// Auto-submitting HTML form posting the AuthnRequest to the IdP.
fn post_binding(request: &AuthnRequest, relay_id: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html><html><body>\
         <form method=\"post\" action=\"{action}\" id=\"SAMLRequestForm\">\
         <input type=\"hidden\" name=\"SAMLRequest\" value=\"{request}\" />\
         <input type=\"hidden\" name=\"RelayState\" value=\"{relay}\" />\
         <input id=\"SAMLSubmitButton\" type=\"submit\" value=\"Submit\" />\
         </form>\
         <script>{script}</script>\
         </body></html>",
        action = html_escape(&request.destination),
        request = html_escape(&STANDARD.encode(&request.xml)),
        relay = html_escape(relay_id),
        script = POST_BINDING_SCRIPT,
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_SECURITY_POLICY, POST_BINDING_CSP),
            (header::CONTENT_TYPE, "text/html"),
        ],
        body,
    )
        .into_response()
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
