use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Session cookie and token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session lifetime in seconds. Also the session cookie's Max-Age.
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    /// Mark cookies as Secure (HTTPS only).
    #[serde(default = "default_true")]
    pub secure: bool,

    /// SameSite attribute of the session cookie.
    #[serde(default)]
    pub same_site: SameSite,

    /// Optional Domain attribute of the session cookie.
    #[serde(default)]
    pub domain: Option<String>,

    /// MAC algorithm for session and relay state tokens.
    #[serde(default)]
    pub signing_algorithm: SigningAlgorithm,

    /// Tolerated clock skew, in seconds, when checking token time claims.
    #[serde(default)]
    pub clock_skew_secs: u64,

    /// Relay state cookies (one per in-flight login).
    #[serde(default)]
    pub relay_state: RelayStateConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            duration_secs: default_duration(),
            secure: true,
            same_site: SameSite::default(),
            domain: None,
            signing_algorithm: SigningAlgorithm::default(),
            clock_skew_secs: 0,
            relay_state: RelayStateConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.is_empty() {
            return Err(ConfigError::Validation(
                "session.cookie_name cannot be empty".into(),
            ));
        }
        if self.duration_secs == 0 {
            return Err(ConfigError::Validation(
                "session.duration_secs must be greater than zero".into(),
            ));
        }
        self.relay_state.validate()?;
        if self.cookie_name.starts_with(&self.relay_state.cookie_prefix) {
            return Err(ConfigError::Validation(format!(
                "session.cookie_name '{}' must not start with the relay state prefix '{}'",
                self.cookie_name, self.relay_state.cookie_prefix
            )));
        }
        Ok(())
    }

    /// Settings that load but are unlikely to work in a browser.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.secure
            && (self.same_site == SameSite::None || self.relay_state.same_site == SameSite::None)
        {
            warnings.push(
                "cookies use SameSite=None without Secure and browsers will reject them; \
                 set session.secure = true outside local development"
                    .to_string(),
            );
        }
        warnings
    }
}

/// Relay state cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayStateConfig {
    /// Prefix of relay state cookie names; the relay ID follows it.
    #[serde(default = "default_relay_prefix")]
    pub cookie_prefix: String,

    /// How long an in-flight login stays valid, in seconds.
    #[serde(default = "default_relay_max_age")]
    pub max_age_secs: u64,

    /// SameSite attribute of relay state cookies. The IdP posts back
    /// cross-site, so anything stricter than `none` drops the cookie.
    #[serde(default = "default_relay_same_site")]
    pub same_site: SameSite,
}

impl Default for RelayStateConfig {
    fn default() -> Self {
        Self {
            cookie_prefix: default_relay_prefix(),
            max_age_secs: default_relay_max_age(),
            same_site: default_relay_same_site(),
        }
    }
}

impl RelayStateConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "session.relay_state.cookie_prefix cannot be empty".into(),
            ));
        }
        if self.max_age_secs == 0 {
            return Err(ConfigError::Validation(
                "session.relay_state.max_age_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl From<SameSite> for tower_cookies::cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Lax => Self::Lax,
            SameSite::Strict => Self::Strict,
            SameSite::None => Self::None,
        }
    }
}

/// Symmetric MAC used to sign tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl From<SigningAlgorithm> for jsonwebtoken::Algorithm {
    fn from(value: SigningAlgorithm) -> Self {
        match value {
            SigningAlgorithm::HS256 => Self::HS256,
            SigningAlgorithm::HS384 => Self::HS384,
            SigningAlgorithm::HS512 => Self::HS512,
        }
    }
}

fn default_cookie_name() -> String {
    "token".to_string()
}

fn default_duration() -> u64 {
    60 * 60 // 1 hour
}

fn default_relay_prefix() -> String {
    "saml_".to_string()
}

fn default_relay_max_age() -> u64 {
    10 * 60 // 10 minutes
}

fn default_relay_same_site() -> SameSite {
    SameSite::None
}

fn default_true() -> bool {
    true
}
