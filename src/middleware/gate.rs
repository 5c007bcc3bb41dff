//! Session gate and attribute authorization dispatcher.
//!
//! Runs in front of everything except the SAML endpoints:
//! 1. rejects paths that are not in canonical form (see [`non_canonical_path`]);
//! 2. strips client-supplied identity headers;
//! 3. attaches the session identity (extension, and headers for the upstream);
//! 4. applies the first matching access rule (longest prefix first).
//!
//! A matching rule with no session starts a login; a session that does not
//! satisfy the rule gets a 403. Requests no rule matches pass through.

use axum::{
    Json,
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    AppState,
    auth::{AuthError, Identity},
};

pub async fn saml_gate_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|o| o.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let path = uri.path();

    // Rules match the path as written; the upstream must not see another one.
    if let Some(violation) = non_canonical_path(path) {
        return Err(AuthError::BadRequest(format!("{violation} in {path:?}")));
    }

    if state.gatekeeper.is_saml_endpoint(path) {
        return Ok(next.run(req).await);
    }

    // Get cookies from request extensions (set by CookieManagerLayer)
    let cookies = req
        .extensions()
        .get::<Cookies>()
        .cloned()
        .ok_or_else(|| AuthError::Internal("cookie manager layer is not installed".into()))?;

    let upstream = &state.config.upstream;
    strip_identity_headers(req.headers_mut(), &upstream.identity_header_prefix);

    let identity = state.gatekeeper.session(&cookies);
    if let Some(identity) = &identity {
        if upstream.forward_identity_headers {
            insert_identity_headers(
                req.headers_mut(),
                &upstream.identity_header_prefix,
                identity,
            );
        }
        req.extensions_mut().insert(identity.clone());
    }

    let Some(rule) = state.rules.iter().find(|rule| rule.matches(path)) else {
        return Ok(next.run(req).await);
    };

    let Some(identity) = identity else {
        tracing::debug!(path = %path, prefix = %rule.prefix, "No session, starting login");
        return state.gatekeeper.require_account(&uri, &cookies);
    };

    if let Some((name, value)) = rule.requirement()
        && !identity.has_attribute_value(name, value)
    {
        return Err(AuthError::Forbidden(format!(
            "subject {:?} lacks {name}={value} required by rule {}",
            identity.subject, rule.prefix
        )));
    }

    if rule.expose_attributes {
        return Ok(Json(identity).into_response());
    }

    Ok(next.run(req).await)
}

/// Why `path` could resolve to a different path downstream than the one
/// access rules were matched against, if it could.
///
/// Rejected: dot segments, empty segments, backslashes, malformed escapes,
/// and escapes of unreserved characters or path separators (`%61`, `%2e`,
/// `%2F`, `%5C`).
pub fn non_canonical_path(path: &str) -> Option<&'static str> {
    if !path.starts_with('/') {
        return Some("relative path");
    }
    if path.contains('\\') {
        return Some("backslash");
    }
    if path.contains("//") {
        return Some("empty path segment");
    }
    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return Some("dot segment");
    }

    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let decoded = match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&hi), Some(&lo)) => hex_value(hi).zip(hex_value(lo)),
                _ => None,
            };
            let Some((hi, lo)) = decoded else {
                return Some("malformed percent-encoding");
            };
            let byte = (hi << 4) | lo;
            if byte.is_ascii_alphanumeric() || b"-._~/\\".contains(&byte) {
                return Some("needless percent-encoding");
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    None
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|v| v as u8)
}

/// Remove every header whose name starts with `prefix` (case-insensitive).
pub fn strip_identity_headers(headers: &mut HeaderMap, prefix: &str) {
    let prefix = prefix.to_ascii_lowercase();
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(&prefix))
        .cloned()
        .collect();
    for name in spoofed {
        tracing::debug!(header = %name, "Stripping client-supplied identity header");
        headers.remove(&name);
    }
}

/// Add `<prefix>Subject` and one `<prefix>Attr-<name>` header per attribute,
/// values comma-joined. Attributes whose name or values cannot be expressed
/// as a header are skipped.
pub fn insert_identity_headers(headers: &mut HeaderMap, prefix: &str, identity: &Identity) {
    if let Some(subject) = &identity.subject {
        insert_header(headers, &format!("{prefix}Subject"), subject);
    }
    for (name, values) in &identity.attributes {
        insert_header(headers, &format!("{prefix}Attr-{name}"), &values.join(","));
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::try_from(name),
        HeaderValue::try_from(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::debug!(header = %name, "Skipping identity header that is not valid HTTP"),
    }
}
