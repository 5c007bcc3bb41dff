//! Reverse proxy to the protected upstream.
//!
//! Requests reach this handler only after the session gate has let them
//! through, with identity headers already attached.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::AppState;

/// Connection-scoped headers that must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Drop the gatekeeper's own cookies (session and relay state) from the
/// `Cookie` header so the upstream never holds a replayable token. Other
/// cookies pass through, joined into a single header.
fn strip_gatekeeper_cookies(headers: &mut HeaderMap, session_cookie: &str, relay_prefix: &str) {
    let kept: Vec<String> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let name = pair.split_once('=').map_or(*pair, |(name, _)| name).trim();
            name != session_cookie && !name.starts_with(relay_prefix)
        })
        .map(str::to_string)
        .collect();

    headers.remove(header::COOKIE);
    if kept.is_empty() {
        return;
    }
    match HeaderValue::try_from(kept.join("; ")) {
        Ok(value) => {
            headers.insert(header::COOKIE, value);
        }
        Err(e) => tracing::debug!(error = %e, "Dropping unforwardable Cookie header"),
    }
}

/// Forward the request to `upstream.url`, preserving method, path, query,
/// headers and body.
#[tracing::instrument(name = "proxy", skip_all, fields(method = %req.method(), path = %req.uri().path()))]
pub async fn proxy(State(state): State<AppState>, req: Request) -> Response {
    let Some(base) = state.config.upstream.url.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("{}{}", base.trim_end_matches('/'), path_and_query);

    let body = match axum::body::to_bytes(body, state.config.server.body_limit_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    let session = &state.config.session;
    strip_gatekeeper_cookies(
        &mut headers,
        &session.cookie_name,
        &session.relay_state.cookie_prefix,
    );

    let upstream_response = match state
        .http_client
        .request(parts.method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, upstream = %target, "Upstream request failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let status = upstream_response.status();
    let mut response_headers = upstream_response.headers().clone();
    strip_hop_by_hop(&mut response_headers);

    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}
