use std::sync::Arc;

use super::{RelayStateStore, SamlEngine, TokenCodec};
use crate::config::{GatekeeperConfig, SessionConfig};

/// Everything the request path needs to run the SAML flow.
///
/// Built once at startup and shared read-only across requests. The operations
/// live next to their concerns: [`Gatekeeper::require_account`] (initiator),
/// [`Gatekeeper::consume_assertion`] (authorizer) and [`Gatekeeper::session`]
/// (session gate).
pub struct Gatekeeper {
    pub(super) engine: Arc<dyn SamlEngine>,
    pub(super) codec: TokenCodec,
    pub(super) relay_state: RelayStateStore,
    pub(super) session: SessionConfig,
    pub(super) acs_path: String,
    pub(super) metadata_path: String,
    pub(super) allow_idp_initiated: bool,
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("entity_id", &self.engine.entity_id())
            .field("acs_path", &self.acs_path)
            .field("metadata_path", &self.metadata_path)
            .field("allow_idp_initiated", &self.allow_idp_initiated)
            .finish_non_exhaustive()
    }
}

impl Gatekeeper {
    pub fn new(config: &GatekeeperConfig, engine: Arc<dyn SamlEngine>, codec: TokenCodec) -> Self {
        Self {
            engine,
            codec,
            relay_state: RelayStateStore::new(&config.saml, &config.session),
            session: config.session.clone(),
            acs_path: config.saml.acs_path.clone(),
            metadata_path: config.saml.metadata_path.clone(),
            allow_idp_initiated: config.saml.allow_idp_initiated,
        }
    }

    pub fn entity_id(&self) -> &str {
        self.engine.entity_id()
    }

    pub fn acs_path(&self) -> &str {
        &self.acs_path
    }

    pub fn metadata_path(&self) -> &str {
        &self.metadata_path
    }

    /// True for the endpoints that must stay reachable without a session.
    pub fn is_saml_endpoint(&self, path: &str) -> bool {
        path == self.acs_path || path == self.metadata_path
    }

    /// SP metadata XML.
    pub fn metadata(&self) -> Result<String, super::EngineError> {
        self.engine.metadata()
    }
}
