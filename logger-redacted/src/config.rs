// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, coloured output for local development
    Pretty,
    /// One JSON object per line for log shippers
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub log_level: String,
    pub format: LogFormat,
    pub redaction_enabled: bool,
    /// Replace detected values with a short hash so lines can still be correlated
    pub hash_for_correlation: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            redaction_enabled: true,
            hash_for_correlation: true,
        }
    }
}

impl LoggerConfig {
    /// Load from `LOG_LEVEL`, `LOG_FORMAT`, `SPEECHCARE_ENV` and `LOG_REDACTION`.
    ///
    /// Production defaults to JSON output; redaction can only be switched off
    /// explicitly.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let is_production = std::env::var("SPEECHCARE_ENV")
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            _ if is_production => LogFormat::Json,
            _ => defaults.format,
        };

        let redaction_enabled = std::env::var("LOG_REDACTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.redaction_enabled);

        Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            format,
            redaction_enabled,
            hash_for_correlation: defaults.hash_for_correlation,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
