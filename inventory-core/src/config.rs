//! Server configuration.
//!
//! Values come from the process environment (after `dotenv` has loaded any
//! `.env` file) with development defaults where that is safe.

use serde::{Deserialize, Serialize};
use std::env;

/// Inventory server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Apply embedded migrations at startup
    pub run_migrations: bool,

    /// HS256 secret for access and refresh tokens
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,

    /// Refresh token lifetime in seconds
    pub jwt_refresh_lifetime_secs: i64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = AppConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: parse_var("SERVER_PORT", "3000")?,

            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingRequired("DATABASE_URL".to_string()))?,

            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "10")?,

            run_migrations: env::var("RUN_MIGRATIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),

            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| ConfigError::MissingRequired("JWT_SECRET".to_string()))?,

            jwt_access_lifetime_secs: parse_var("JWT_ACCESS_LIFETIME_SECS", "3600")?,

            jwt_refresh_lifetime_secs: parse_var("JWT_REFRESH_LIFETIME_SECS", "604800")?,
        };

        if config.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue("JWT_SECRET".to_string()));
        }

        Ok(config)
    }

    /// Address string for the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let port: u16 = parse_var("INVENTORY_TEST_UNSET_PORT", "4100").unwrap();
        assert_eq!(port, 4100);
    }

    #[test]
    fn test_parse_var_rejects_garbage_default() {
        let result: Result<u16, _> = parse_var("INVENTORY_TEST_UNSET_PORT", "not-a-port");
        assert!(matches!(result, Err(ConfigError::InvalidValue(name)) if name == "INVENTORY_TEST_UNSET_PORT"));
    }
}
