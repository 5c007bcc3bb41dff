use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Upstream service that permitted requests are forwarded to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the protected service. Without it, requests that pass the
    /// gate get a 404.
    #[serde(default)]
    pub url: Option<String>,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Send the authenticated subject and attributes as request headers.
    #[serde(default = "default_true")]
    pub forward_identity_headers: bool,

    /// Prefix of identity headers. Client-supplied headers with this prefix
    /// are always stripped.
    #[serde(default = "default_header_prefix")]
    pub identity_header_prefix: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout(),
            forward_identity_headers: true,
            identity_header_prefix: default_header_prefix(),
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.url {
            let parsed = url::Url::parse(url).map_err(|e| {
                ConfigError::Validation(format!("upstream.url '{url}' is invalid: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "upstream.url must be http(s), got '{url}'"
                )));
            }
        }
        if http::HeaderName::try_from(format!("{}subject", self.identity_header_prefix)).is_err() {
            return Err(ConfigError::Validation(format!(
                "upstream.identity_header_prefix '{}' is not a valid header name",
                self.identity_header_prefix
            )));
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_header_prefix() -> String {
    "X-Saml-".to_string()
}
