//! Server configuration loaded from the environment

use secrecy::Secret;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
/// Uploads above this size are rejected before they reach the assessor
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where progress documents and trials live
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    Postgres { database_url: Secret<String> },
}

impl StorageConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::Memory => "memory",
            StorageConfig::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    /// HS256 signing secret shared with the identity provider
    pub jwt_secret: Secret<String>,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// `JWT_SECRET` is required and must be at least 32 bytes. `DATABASE_URL`
    /// selects PostgreSQL storage; without it the in-memory store is used.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("SPEECHCARE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = match std::env::var("SPEECHCARE_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "SPEECHCARE_PORT",
                reason: format!("'{raw}' is not a port number"),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let storage = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => StorageConfig::Postgres {
                database_url: Secret::new(url),
            },
            _ => StorageConfig::Memory,
        };

        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        let jwt_secret = Self::check_jwt_secret(jwt_secret)?;

        let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| Self::parse_origins(&raw))
            .unwrap_or_default();

        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            host,
            port,
            storage,
            jwt_secret,
            cors_origins,
            max_upload_bytes,
        })
    }

    /// Config for router tests: in-memory storage, permissive CORS
    pub fn for_testing(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            storage: StorageConfig::Memory,
            jwt_secret: Secret::new(jwt_secret.into()),
            cors_origins: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn check_jwt_secret(secret: String) -> Result<Secret<String>, ConfigError> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }
        Ok(Secret::new(secret))
    }

    fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_skips_blanks() {
        let origins = ServerConfig::parse_origins(" http://localhost:3000, ,https://app.example.org ");
        assert_eq!(origins, vec!["http://localhost:3000", "https://app.example.org"]);
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let err = ServerConfig::check_jwt_secret("too-short".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "JWT_SECRET", .. }));
        assert!(ServerConfig::check_jwt_secret("x".repeat(32)).is_ok());
    }

    #[test]
    fn test_testing_config_uses_memory_storage() {
        let config = ServerConfig::for_testing("s".repeat(32));
        assert_eq!(config.storage.backend_name(), "memory");
        assert_eq!(config.bind_address(), "127.0.0.1:0");
    }
}
