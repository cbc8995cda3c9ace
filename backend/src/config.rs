//! Configuration management for the Tradeflow platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with TRADEFLOW_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Base URL of the SPA, used for links in emails
    pub frontend_url: String,

    /// Allowed CORS origin; `*` allows any
    pub cors_allowed_origin: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Outgoing email configuration
    pub smtp: SmtpConfig,

    /// Exchange-rate provider configuration
    pub exchange_rate: ExchangeRateConfig,

    /// Company lifecycle configuration
    pub company: CompanyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    /// Send mail through SMTP; when false, mails are only logged
    pub enabled: bool,

    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: String,

    pub from_email: String,

    pub from_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeRateConfig {
    /// Base URL of a Frankfurter-compatible rates API
    pub api_endpoint: String,

    /// How long a fetched rate is reused
    pub cache_ttl_seconds: u64,

    /// Per-request timeout
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompanyConfig {
    /// Unverified companies older than this are removed
    pub unverified_ttl_hours: i64,

    /// Interval of the expired-company cleanup task
    pub cleanup_interval_seconds: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("TRADEFLOW_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("frontend_url", "http://localhost:5173")?
            .set_default("cors_allowed_origin", "*")?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("smtp.enabled", false)?
            .set_default("smtp.host", "localhost")?
            .set_default("smtp.port", 587)?
            .set_default("smtp.username", "")?
            .set_default("smtp.password", "")?
            .set_default("smtp.from_email", "noreply@tradeflow.local")?
            .set_default("smtp.from_name", "Tradeflow")?
            .set_default("exchange_rate.api_endpoint", "https://api.frankfurter.app")?
            .set_default("exchange_rate.cache_ttl_seconds", 3600)?
            .set_default("exchange_rate.request_timeout_seconds", 10)?
            .set_default("company.unverified_ttl_hours", 72)?
            .set_default("company.cleanup_interval_seconds", 3600)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (TRADEFLOW_ prefix)
            .add_source(
                Environment::with_prefix("TRADEFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
