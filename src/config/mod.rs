//! Configuration module for the gatekeeper.
//!
//! The gatekeeper is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [saml]
//! entity_id = "https://app.example.com/saml/metadata"
//! root_url = "https://app.example.com"
//! private_key_path = "/etc/gatekeeper/sp.key"
//! certificate_path = "/etc/gatekeeper/sp.crt"
//! idp_metadata_url = "https://idp.example.com/metadata"
//!
//! [upstream]
//! url = "http://127.0.0.1:3000"
//!
//! [[rules]]
//! prefix = "/admin"
//! attribute = "role"
//! value = "admin"
//!
//! [[rules]]
//! prefix = "/"
//! ```

mod observability;
mod rules;
mod saml;
mod server;
mod session;
mod upstream;

use std::path::Path;

pub use observability::*;
pub use rules::*;
pub use saml::*;
use serde::{Deserialize, Serialize};
pub use server::*;
pub use session::*;
pub use upstream::*;

/// Root configuration for the gatekeeper.
///
/// Only `[saml]` is required; every other section has defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatekeeperConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// SAML service provider configuration.
    pub saml: SamlConfig,

    /// Session and relay state cookies.
    #[serde(default)]
    pub session: SessionConfig,

    /// Path-prefix access rules. The longest matching prefix wins.
    #[serde(default)]
    pub rules: Vec<AccessRule>,

    /// Protected upstream service.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl GatekeeperConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: GatekeeperConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.saml.validate()?;
        self.session.validate()?;
        self.upstream.validate()?;
        for rule in &self.rules {
            rule.validate()?;
        }

        Ok(())
    }

    /// Non-fatal configuration problems, for logging once tracing is up.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.session.warnings();

        // SAML endpoints are served before rules are consulted.
        for rule in &self.rules {
            if rule.prefix.len() > 1
                && (rule.matches(&self.saml.acs_path) || rule.matches(&self.saml.metadata_path))
            {
                warnings.push(format!(
                    "rule '{}' covers a SAML endpoint, which stays reachable without a session",
                    rule.prefix
                ));
            }
        }

        warnings
    }

    /// Rules ordered for matching: longest prefix first, ties in file order.
    pub fn ordered_rules(&self) -> Vec<AccessRule> {
        let mut rules = self.rules.clone();
        rules.sort_by_key(|rule| std::cmp::Reverse(rule.prefix.len()));
        rules
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Invalid key material: {0}")]
    Key(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("env var pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [saml]
        entity_id = "https://sp.example.com/saml/metadata"
        root_url = "https://sp.example.com"
        private_key_pem = "key"
        certificate_pem = "cert"
        idp_metadata_xml = "<EntityDescriptor/>"
    "#;

    #[test]
    fn test_minimal_config() {
        let config = GatekeeperConfig::from_str(MINIMAL).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.cookie_name, "token");
        assert!(config.rules.is_empty());
        assert!(config.upstream.url.is_none());
    }

    #[test]
    fn test_missing_saml_section_rejected() {
        assert!(matches!(
            GatekeeperConfig::from_str("[server]\nport = 9000"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let input = format!("{MINIMAL}\n[session]\ncookie = \"x\"\n");
        assert!(matches!(
            GatekeeperConfig::from_str(&input),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rules_ordered_longest_prefix_first() {
        let input = format!(
            r#"{MINIMAL}
            [[rules]]
            prefix = "/"

            [[rules]]
            prefix = "/admin"
            attribute = "role"
            value = "admin"

            [[rules]]
            prefix = "/api"

            [[rules]]
            prefix = "/app"
            expose_attributes = true
            "#
        );
        let config = GatekeeperConfig::from_str(&input).unwrap();
        let prefixes: Vec<_> = config
            .ordered_rules()
            .into_iter()
            .map(|r| r.prefix)
            .collect();
        assert_eq!(prefixes, vec!["/admin", "/api", "/app", "/"]);
    }

    #[test]
    fn test_warnings_collected_not_fatal() {
        assert!(GatekeeperConfig::from_str(MINIMAL).unwrap().warnings().is_empty());

        let input = format!(
            r#"{MINIMAL}
            [session]
            secure = false

            [[rules]]
            prefix = "/saml"

            [[rules]]
            prefix = "/"
            "#
        );
        let warnings = GatekeeperConfig::from_str(&input).unwrap().warnings();

        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("SameSite=None"));
        assert!(warnings[1].contains("'/saml'"));
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let input = format!(
            r#"{MINIMAL}
            [[rules]]
            prefix = "/admin"
            value = "admin"
            "#
        );
        assert!(matches!(
            GatekeeperConfig::from_str(&input),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), MINIMAL).unwrap();
        let config = GatekeeperConfig::from_file(file.path()).unwrap();
        assert_eq!(config.saml.entity_id, "https://sp.example.com/saml/metadata");
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            GatekeeperConfig::from_file("/nonexistent/gatekeeper.toml"),
            Err(ConfigError::Io(_, _))
        ));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_SP_ENTITY", Some("https://sp.example.com/id"), || {
            let result = expand_env_vars("entity_id = \"${TEST_SP_ENTITY}\"").unwrap();
            assert_eq!(result, "entity_id = \"https://sp.example.com/id\"");
        });
    }

    #[test]
    fn test_env_var_missing() {
        temp_env::with_var_unset("TEST_SP_MISSING", || {
            assert!(matches!(
                expand_env_vars("key = \"${TEST_SP_MISSING}\""),
                Err(ConfigError::EnvVarNotFound(name)) if name == "TEST_SP_MISSING"
            ));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# key = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# key = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("TEST_MULTI", Some("value1"), || {
            let input = r#"key1 = "${TEST_MULTI}"
# key2 = "${NONEXISTENT}"
key3 = "literal""#;
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                r#"key1 = "value1"
# key2 = "${NONEXISTENT}"
key3 = "literal""#
            );
        });
    }
}
