use serde::{Deserialize, Serialize};

/// `[observability]` section. The gatekeeper only emits logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[observability.logging]`
///
/// ```toml
/// [observability.logging]
/// level = "debug"
/// format = "json"
/// filter = "saml_gatekeeper=trace"
/// ```
///
/// `RUST_LOG`, when set, replaces `level` and `filter` entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Minimum level for every target not named in `filter`.
    pub level: LogLevel,

    pub format: LogFormat,

    /// Prefix each line (or JSON record) with a timestamp. Turn off when the
    /// log collector stamps records itself.
    pub timestamps: bool,

    /// Source file and line of each event.
    pub file_line: bool,

    /// JSON only: attach the current span (e.g. `saml.acs`) to each record.
    pub include_spans: bool,

    /// Extra `EnvFilter` directives appended after `level`.
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            timestamps: true,
            file_line: false,
            include_spans: true,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line, for a terminal.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}
