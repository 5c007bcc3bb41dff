use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AuthError,
    claims::{Attributes, SessionClaims},
};

/// The authenticated caller, as seen by downstream handlers.
///
/// Inserted into request extensions by the session gate when the request
/// carries a valid session token. Lives only as long as the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// NameID of the assertion subject.
    pub subject: Option<String>,

    /// SAML attributes keyed by friendly name (or name when no friendly name
    /// was sent).
    pub attributes: Attributes,

    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Values of an attribute, empty when absent.
    pub fn attribute(&self, name: &str) -> &[String] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when the attribute is present and one of its values equals `value`.
    pub fn has_attribute_value(&self, name: &str, value: &str) -> bool {
        self.attribute(name).iter().any(|v| v == value)
    }
}

impl From<SessionClaims> for Identity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            subject: claims.sub,
            attributes: claims.attr,
            expires_at: DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or_default(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AuthError::Forbidden("no authenticated identity on request".into()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn identity() -> Identity {
        let mut attributes = Attributes::new();
        attributes.insert("role".into(), vec!["admin".into(), "user".into()]);
        Identity::from(SessionClaims {
            sub: Some("alice".into()),
            aud: "sp".into(),
            iat: 0,
            nbf: 0,
            exp: 1_700_000_000,
            attr: attributes,
        })
    }

    #[test]
    fn test_attribute_lookup() {
        let identity = identity();
        assert!(identity.has_attribute_value("role", "user"));
        assert!(!identity.has_attribute_value("role", "owner"));
        assert!(!identity.has_attribute_value("group", "admin"));
        assert!(identity.attribute("group").is_empty());
        assert_eq!(identity.expires_at.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_extractor() {
        let (mut parts, _) = Request::new(()).into_parts();
        assert!(Identity::from_request_parts(&mut parts, &()).await.is_err());

        parts.extensions.insert(identity());
        let extracted = Identity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted.subject.as_deref(), Some("alice"));
    }
}
