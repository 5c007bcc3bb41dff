//! Stateless SAML service provider that guards HTTP resources behind
//! federated single sign-on.
//!
//! In-flight logins and sessions live entirely in signed cookies, so any
//! number of instances can serve the same users without shared storage.
//!
//! Embed the gate in front of your own routes with [`build_router`], or run
//! the bundled binary, which proxies permitted requests to an upstream.
//! Handlers behind the gate can take the caller's [`Identity`] as an
//! extractor, and per-route attribute checks are available through
//! [`require_attribute`].

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod middleware;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;

#[cfg(test)]
mod tests;

pub use auth::{Gatekeeper, Identity};
use config::{AccessRule, GatekeeperConfig};
pub use middleware::{AttributeRequirement, require_attribute};

/// Shared request-path state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatekeeperConfig>,
    pub gatekeeper: Arc<Gatekeeper>,
    /// Access rules, longest prefix first.
    pub rules: Arc<[AccessRule]>,
    /// Client for the upstream proxy.
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatekeeperConfig, gatekeeper: Gatekeeper) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            rules: config.ordered_rules().into(),
            config: Arc::new(config),
            gatekeeper: Arc::new(gatekeeper),
            http_client,
        })
    }
}

/// Put the SAML endpoints and the session gate in front of `downstream`.
///
/// Every downstream request passes the gate; the metadata and assertion
/// consumer endpoints are served without a session.
pub fn build_router(state: AppState, downstream: Router) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route(
            state.gatekeeper.metadata_path(),
            get(routes::saml::saml_metadata),
        )
        .route(state.gatekeeper.acs_path(), post(routes::saml::saml_acs))
        .with_state(state.clone())
        .merge(downstream)
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::saml_gate_middleware,
        ))
        .layer(CookieManagerLayer::new())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// The standalone gatekeeper: health probes plus a reverse proxy to the
/// configured upstream.
pub fn build_app(state: AppState) -> Router {
    let downstream = Router::new()
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        .fallback(routes::proxy::proxy)
        .with_state(state.clone());

    build_router(state, downstream)
}
