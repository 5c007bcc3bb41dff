use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute name → values, as carried in the session token.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Claims of the short-lived token correlating an AuthnRequest with the
/// assertion that answers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayStateClaims {
    /// ID of the AuthnRequest; must come back as `InResponseTo`.
    pub id: String,
    /// Path and query the user originally asked for.
    pub uri: String,
    pub iat: u64,
    pub exp: u64,
}

impl RelayStateClaims {
    pub fn new(id: impl Into<String>, uri: impl Into<String>, max_age_secs: u64) -> Self {
        let now = unix_now();
        Self {
            id: id.into(),
            uri: uri.into(),
            iat: now,
            exp: now + max_age_secs,
        }
    }
}

/// Claims of the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionClaims {
    /// NameID of the assertion subject, absent when the IdP sent none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Our own entity ID.
    pub aud: String,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
    #[serde(default)]
    pub attr: Attributes,
}

impl SessionClaims {
    pub fn new(
        subject: Option<String>,
        audience: impl Into<String>,
        attributes: Attributes,
        duration_secs: u64,
    ) -> Self {
        let now = unix_now();
        Self {
            sub: subject,
            aud: audience.into(),
            iat: now,
            nbf: now,
            exp: now + duration_secs,
            attr: attributes,
        }
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
