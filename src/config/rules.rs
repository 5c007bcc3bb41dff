use serde::{Deserialize, Serialize};

use super::ConfigError;

/// A path-prefix access rule.
///
/// ```toml
/// [[rules]]
/// prefix = "/admin"
/// attribute = "role"
/// value = "admin"
/// ```
///
/// A rule without `attribute`/`value` only requires a valid session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessRule {
    /// Request path prefix this rule guards.
    pub prefix: String,

    /// Attribute that must be present on the session.
    #[serde(default)]
    pub attribute: Option<String>,

    /// Value the attribute must contain.
    #[serde(default)]
    pub value: Option<String>,

    /// Answer permitted requests with the caller's identity as JSON instead
    /// of passing them downstream.
    #[serde(default)]
    pub expose_attributes: bool,
}

impl AccessRule {
    /// The (attribute, value) pair required by this rule, if any.
    pub fn requirement(&self) -> Option<(&str, &str)> {
        match (&self.attribute, &self.value) {
            (Some(name), Some(value)) => Some((name, value)),
            _ => None,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "rule prefix must start with '/', got '{}'",
                self.prefix
            )));
        }
        if self.attribute.is_some() != self.value.is_some() {
            return Err(ConfigError::Validation(format!(
                "rule '{}' must set both attribute and value, or neither",
                self.prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement() {
        let rule: AccessRule = toml::from_str(
            r#"
            prefix = "/admin"
            attribute = "role"
            value = "admin"
            "#,
        )
        .unwrap();
        rule.validate().unwrap();
        assert_eq!(rule.requirement(), Some(("role", "admin")));
        assert!(rule.matches("/admin/users"));
        assert!(!rule.matches("/public"));
    }

    #[test]
    fn test_half_requirement_rejected() {
        let rule: AccessRule = toml::from_str(
            r#"
            prefix = "/admin"
            attribute = "role"
            "#,
        )
        .unwrap();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_relative_prefix_rejected() {
        let rule: AccessRule = toml::from_str(r#"prefix = "admin""#).unwrap();
        assert!(rule.validate().is_err());
    }
}
