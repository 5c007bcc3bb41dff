//! Test doubles for the SAML engine.
//!
//! [`FakeEngine`] stands in for real XML processing: its "SAML responses"
//! are base64 JSON documents built with [`FakeResponse`]. It enforces the
//! same correlation rule as a real engine, i.e. `InResponseTo` must be one of
//! the possible request IDs.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::{
    Assertion, Attribute, AttributeStatement, AuthnRequest, Binding, EngineError, Gatekeeper,
    InvalidResponse, SamlEngine, TokenCodec,
};
use crate::config::{GatekeeperConfig, SigningAlgorithm};

pub const TEST_ENTITY_ID: &str = "https://sp.example.com/saml/metadata";
pub const TEST_SECRET: &[u8] = b"test-token-secret";

pub fn test_config() -> GatekeeperConfig {
    GatekeeperConfig::from_str(
        r#"
        [saml]
        entity_id = "https://sp.example.com/saml/metadata"
        root_url = "https://sp.example.com"
        private_key_pem = "unused"
        certificate_pem = "unused"
        idp_metadata_xml = "<EntityDescriptor/>"
        "#,
    )
    .unwrap()
}

pub fn test_codec() -> TokenCodec {
    TokenCodec::new(TEST_SECRET, SigningAlgorithm::HS256, 0)
}

/// A gatekeeper over the default [`FakeEngine`], after `configure` has
/// adjusted the test config. Also returns a codec sharing its key.
pub fn test_gatekeeper(configure: impl FnOnce(&mut GatekeeperConfig)) -> (Gatekeeper, TokenCodec) {
    test_gatekeeper_with_engine(FakeEngine::default(), configure)
}

pub fn test_gatekeeper_with_engine(
    engine: FakeEngine,
    configure: impl FnOnce(&mut GatekeeperConfig),
) -> (Gatekeeper, TokenCodec) {
    let mut config = test_config();
    configure(&mut config);
    let gatekeeper = Gatekeeper::new(&config, Arc::new(engine), test_codec());
    (gatekeeper, test_codec())
}

pub struct FakeEngine {
    redirect_location: Option<String>,
    post_location: Option<String>,
    next_id: AtomicU64,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            redirect_location: Some("https://idp.example.com/sso/redirect".into()),
            post_location: Some("https://idp.example.com/sso/post".into()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl FakeEngine {
    pub fn without_redirect_binding(mut self) -> Self {
        self.redirect_location = None;
        self
    }

    pub fn without_post_binding(mut self) -> Self {
        self.post_location = None;
        self
    }
}

#[async_trait]
impl SamlEngine for FakeEngine {
    fn entity_id(&self) -> &str {
        TEST_ENTITY_ID
    }

    fn metadata(&self) -> Result<String, EngineError> {
        Ok(format!(
            r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{TEST_ENTITY_ID}"/>"#
        ))
    }

    fn sso_binding_location(&self, binding: Binding) -> Option<String> {
        match binding {
            Binding::Redirect => self.redirect_location.clone(),
            Binding::Post => self.post_location.clone(),
        }
    }

    fn make_authentication_request(&self, location: &str) -> Result<AuthnRequest, EngineError> {
        let id = format!("id-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        Ok(AuthnRequest {
            xml: format!(r#"<samlp:AuthnRequest ID="{id}" Destination="{location}"/>"#),
            id,
            destination: location.to_string(),
        })
    }

    async fn parse_response(
        &self,
        encoded: &str,
        possible_request_ids: &[String],
    ) -> Result<Assertion, InvalidResponse> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| InvalidResponse::new(encoded, format!("base64: {e}")))?;
        let response: FakeResponse = serde_json::from_slice(&bytes)
            .map_err(|e| InvalidResponse::new(encoded, format!("json: {e}")))?;

        let in_response_to = response.in_response_to.unwrap_or_default();
        if !possible_request_ids.contains(&in_response_to) {
            return Err(InvalidResponse::new(
                encoded,
                format!("InResponseTo '{in_response_to}' does not match any request"),
            ));
        }

        Ok(Assertion {
            subject: response.subject,
            attribute_statements: response
                .statements
                .into_iter()
                .map(|attrs| AttributeStatement {
                    attributes: attrs
                        .into_iter()
                        .map(|a| Attribute {
                            name: a.name,
                            friendly_name: a.friendly_name,
                            values: a.values,
                        })
                        .collect(),
                })
                .collect(),
        })
    }
}

/// Builder for the encoded responses [`FakeEngine`] accepts.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FakeResponse {
    in_response_to: Option<String>,
    subject: Option<String>,
    statements: Vec<Vec<FakeAttribute>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FakeAttribute {
    name: String,
    friendly_name: Option<String>,
    values: Vec<String>,
}

impl FakeResponse {
    pub fn answering(request_id: &str) -> Self {
        Self {
            in_response_to: Some(request_id.to_string()),
            ..Default::default()
        }
    }

    pub fn unsolicited() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Add an attribute (name only) to the current statement.
    pub fn attribute(self, name: &str, values: &[&str]) -> Self {
        self.push_attribute(name, None, values)
    }

    /// Add an attribute with a friendly name to the current statement.
    pub fn friendly_attribute(self, name: &str, friendly: &str, values: &[&str]) -> Self {
        self.push_attribute(name, Some(friendly), values)
    }

    /// Start a new attribute statement.
    pub fn next_statement(mut self) -> Self {
        self.statements.push(Vec::new());
        self
    }

    fn push_attribute(mut self, name: &str, friendly: Option<&str>, values: &[&str]) -> Self {
        if self.statements.is_empty() {
            self.statements.push(Vec::new());
        }
        if let Some(statement) = self.statements.last_mut() {
            statement.push(FakeAttribute {
                name: name.to_string(),
                friendly_name: friendly.map(str::to_string),
                values: values.iter().map(|v| v.to_string()).collect(),
            });
        }
        self
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(serde_json::to_vec(self).unwrap())
    }
}
