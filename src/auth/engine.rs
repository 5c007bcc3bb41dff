//! Boundary to the SAML protocol engine.
//!
//! The gatekeeper never touches XML signatures itself. Building
//! AuthnRequests, validating responses, and describing both parties'
//! metadata are delegated to a [`SamlEngine`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// SAML binding used to deliver the AuthnRequest to the IdP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// HTTP-Redirect: deflated request in the query string.
    Redirect,
    /// HTTP-POST: auto-submitted HTML form.
    Post,
}

/// An AuthnRequest ready to be delivered.
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    /// Request ID, echoed back by the IdP as `InResponseTo`.
    pub id: String,
    /// IdP SSO endpoint the request is addressed to.
    pub destination: String,
    /// Serialized `<samlp:AuthnRequest>` XML.
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub friendly_name: Option<String>,
    pub values: Vec<String>,
}

impl Attribute {
    /// Key under which the attribute lands in the session: the friendly
    /// name when present, otherwise the full name.
    pub fn key(&self) -> &str {
        match self.friendly_name.as_deref() {
            Some(friendly) if !friendly.is_empty() => friendly,
            _ => &self.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStatement {
    pub attributes: Vec<Attribute>,
}

/// A validated assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assertion {
    /// Subject NameID value.
    pub subject: Option<String>,
    pub attribute_statements: Vec<AttributeStatement>,
}

/// Why a SAML response was refused, with enough context to debug it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid SAML response: {cause}")]
pub struct InvalidResponse {
    /// The encoded response as received.
    pub response: String,
    /// When validation ran.
    pub now: DateTime<Utc>,
    pub cause: String,
}

impl InvalidResponse {
    pub fn new(response: &str, cause: impl Into<String>) -> Self {
        Self {
            response: response.to_string(),
            now: Utc::now(),
            cause: cause.into(),
        }
    }
}

/// Engine failures other than response validation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to build authentication request: {0}")]
    AuthnRequest(String),

    #[error("failed to build metadata: {0}")]
    Metadata(String),

    #[error("engine setup failed: {0}")]
    Setup(String),
}

#[async_trait]
pub trait SamlEngine: Send + Sync {
    /// Our SP entity ID.
    fn entity_id(&self) -> &str;

    /// SP metadata XML.
    fn metadata(&self) -> Result<String, EngineError>;

    /// IdP SSO location for a binding, if the IdP supports it.
    fn sso_binding_location(&self, binding: Binding) -> Option<String>;

    /// Build an AuthnRequest addressed to `location`.
    fn make_authentication_request(&self, location: &str) -> Result<AuthnRequest, EngineError>;

    /// Decode and validate a base64 SAML response.
    ///
    /// The response must answer one of `possible_request_ids`; the empty
    /// string stands for an unsolicited response.
    async fn parse_response(
        &self,
        encoded: &str,
        possible_request_ids: &[String],
    ) -> Result<Assertion, InvalidResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_key_prefers_friendly_name() {
        let mut attr = Attribute {
            name: "urn:oid:1.3.6.1.4.1.5923.1.1.1.1".into(),
            friendly_name: Some("eduPersonAffiliation".into()),
            values: vec![],
        };
        assert_eq!(attr.key(), "eduPersonAffiliation");

        attr.friendly_name = Some(String::new());
        assert_eq!(attr.key(), "urn:oid:1.3.6.1.4.1.5923.1.1.1.1");

        attr.friendly_name = None;
        assert_eq!(attr.key(), "urn:oid:1.3.6.1.4.1.5923.1.1.1.1");
    }
}
