//! Application configuration from environment variables or CLI arguments.

use std::time::Duration;

use clap::Parser;

use crate::network::NetworkConfig;

/// tarot.vn backend service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "tarot-server", about = "Backend API service for tarot.vn")]
pub struct Config {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Base URL of the web frontend, used as the default CORS origin
    #[arg(long, env = "BASE_WEB_URL", default_value = "http://localhost:4321")]
    pub base_web_url: String,

    /// Allowed CORS origins (comma-separated; defaults to the base web URL)
    #[arg(long, env = "ALLOWED_ORIGINS")]
    pub allowed_origins: Option<String>,

    /// Minimum log severity (DEBUG, INFO, WARNING, ERROR)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Enable debug behaviour
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Deployment environment name
    #[arg(long, env = "ENVIRONMENT", default_value = "production")]
    pub environment: String,

    /// Message returned by the root informational endpoint
    #[arg(
        long,
        env = "SERVICE_DESCRIPTION",
        default_value = "Backend API service for tarot.vn"
    )]
    pub service_description: String,

    /// Maximum time to wait for a request to complete, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("allowed CORS origins resolved to an empty list")]
    NoAllowedOrigins,
    #[error("request timeout must be > 0 seconds")]
    InvalidRequestTimeout,
}

impl Config {
    /// Parse and validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when arguments fail to parse or validation rejects
    /// the resolved values.
    pub fn init() -> anyhow::Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_origins().is_empty() {
            return Err(ConfigError::NoAllowedOrigins);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidRequestTimeout);
        }
        Ok(())
    }

    /// The normalized CORS origin allow-list: entries are trimmed, trailing
    /// slashes stripped, empty entries dropped. Falls back to the base web
    /// URL when no explicit list is configured.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        let raw = self.allowed_origins.as_deref().unwrap_or(&self.base_web_url);
        raw.split(',')
            .map(|origin| origin.trim().trim_end_matches('/'))
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Network-facing view of this configuration.
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.allowed_origins(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
