//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `MAX_DB_CONNECTIONS` (optional): pool size, defaults to 5
/// - `BASE_DOMAIN` (optional): apex domain whose labels are tenant subdomains, defaults to `localhost`
/// - `PUBLIC_API_URL` (optional): externally reachable base URL, used in iCal export links
/// - `COMMISSION_RATE_BPS` (optional): platform commission in basis points, defaults to 1500 (15%)
/// - `TENANT_CACHE_TTL_SECS` (optional): lifetime of cached host lookups, defaults to 300
/// - `WEBHOOK_TIMEOUT_SECS` (optional): outbound HTTP timeout, defaults to 5
/// - `CORS_ORIGINS` (optional): comma-separated list of allowed origins
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,

    #[serde(default = "default_base_domain")]
    pub base_domain: String,

    #[serde(default = "default_public_api_url")]
    pub public_api_url: String,

    #[serde(default = "default_commission_rate_bps")]
    pub commission_rate_bps: i64,

    #[serde(default = "default_tenant_cache_ttl_secs")]
    pub tenant_cache_ttl_secs: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    pub cors_origins: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_db_connections() -> u32 {
    5
}

fn default_base_domain() -> String {
    "localhost".to_string()
}

fn default_public_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_commission_rate_bps() -> i64 {
    1500
}

fn default_tenant_cache_ttl_secs() -> u64 {
    300
}

fn default_webhook_timeout_secs() -> u64 {
    5
}

/// Configuration values that parse but make no sense.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("COMMISSION_RATE_BPS must be between 0 and 10000, got {0}")]
    InvalidCommissionRate(i64),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("BASE_DOMAIN must not be empty")]
    EmptyBaseDomain,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - Parsed values fail validation
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let mut config = envy::from_env::<Config>()?;
        config.base_domain = config.base_domain.trim().trim_matches('.').to_lowercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=10_000).contains(&self.commission_rate_bps) {
            return Err(ConfigError::InvalidCommissionRate(self.commission_rate_bps));
        }
        if self.tenant_cache_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("TENANT_CACHE_TTL_SECS"));
        }
        if self.webhook_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("WEBHOOK_TIMEOUT_SECS"));
        }
        if self.base_domain.is_empty() {
            return Err(ConfigError::EmptyBaseDomain);
        }
        Ok(())
    }

    /// CORS origins as a list, empty when unset.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/villa_test".to_string(),
        server_port: default_port(),
        max_db_connections: default_max_db_connections(),
        base_domain: "villa.test".to_string(),
        public_api_url: default_public_api_url(),
        commission_rate_bps: default_commission_rate_bps(),
        tenant_cache_ttl_secs: default_tenant_cache_ttl_secs(),
        webhook_timeout_secs: default_webhook_timeout_secs(),
        cors_origins: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn rejects_commission_above_one_hundred_percent() {
        let config = Config {
            commission_rate_bps: 10_001,
            ..test_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCommissionRate(10_001))
        ));
    }

    #[test]
    fn rejects_zero_cache_ttl() {
        let config = Config {
            tenant_cache_ttl_secs: 0,
            ..test_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration("TENANT_CACHE_TTL_SECS"))
        ));
    }

    #[test]
    fn parses_cors_origins() {
        let config = Config {
            cors_origins: Some("https://admin.villa.test, ,https://villa.test".to_string()),
            ..test_config()
        };
        assert_eq!(
            config.cors_origins_list(),
            vec!["https://admin.villa.test", "https://villa.test"]
        );
    }
}
