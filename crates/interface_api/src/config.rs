//! API configuration

use serde::{Deserialize, Serialize};

use domain_bulk::DEFAULT_CHUNK_SIZE;
use domain_integrations::HttpSmsConfig;
use domain_tenancy::TenancyConfig;

/// API configuration
///
/// Loaded from `API_*` environment variables; nested sections use a double
/// underscore, e.g. `API_TENANCY__BASE_DOMAIN=isp.example.net`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Maximum pooled connections
    pub database_max_connections: u32,
    /// Log level
    pub log_level: String,
    /// Host resolution and new-company defaults
    pub tenancy: TenancyConfig,
    /// Customers per bulk transaction
    pub bulk_chunk_size: usize,
    /// HTTP SMS gateway; messages are logged as failed when unset
    pub sms: Option<HttpSmsConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/isp_billing".to_string(),
            database_max_connections: 10,
            log_level: "info".to_string(),
            tenancy: TenancyConfig::default(),
            bulk_chunk_size: DEFAULT_CHUNK_SIZE,
            sms: None,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.bulk_chunk_size, 100);
        assert_eq!(config.tenancy.super_admin_domain, "admin.example.com");
        assert!(config.sms.is_none());
    }
}
