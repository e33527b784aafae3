use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name used as the subject of service tokens
    #[serde(default = "default_service_name")]
    pub service_name: String,

    // Session store
    pub redis_url: Option<String>,
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,
    /// Default session lifetime in seconds, refreshed on every save
    #[serde(default = "default_session_cookie_age")]
    pub session_cookie_age: u64,

    // Event relay
    pub kafka_bootstrap_servers: Option<String>,
    #[serde(default = "default_kafka_group_id")]
    pub kafka_group_id: String,
    #[serde(default = "default_kafka_poll_window_ms")]
    pub kafka_poll_window_ms: u64,
    #[serde(default = "default_kafka_send_timeout_ms")]
    pub kafka_send_timeout_ms: u64,

    // Document store
    pub mongo_url: Option<String>,
    #[serde(default = "default_mongo_database_name")]
    pub mongo_database_name: String,

    /// Relational authentication database URL
    pub db_url: Option<String>,

    // Upstream service
    pub upstream_base_url: Option<String>,
    pub upstream_token: Option<String>,
    pub upstream_jwt_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "prod" || self.environment.to_lowercase() == "production"
    }

    pub fn kafka_poll_window(&self) -> Duration {
        Duration::from_millis(self.kafka_poll_window_ms)
    }

    pub fn kafka_send_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_send_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            service_name: default_service_name(),
            redis_url: None,
            session_cookie_name: default_session_cookie_name(),
            session_cookie_age: default_session_cookie_age(),
            kafka_bootstrap_servers: None,
            kafka_group_id: default_kafka_group_id(),
            kafka_poll_window_ms: default_kafka_poll_window_ms(),
            kafka_send_timeout_ms: default_kafka_send_timeout_ms(),
            mongo_url: None,
            mongo_database_name: default_mongo_database_name(),
            db_url: None,
            upstream_base_url: None,
            upstream_token: None,
            upstream_jwt_secret: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "relay-portal".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_session_cookie_name() -> String {
    "sessionid".to_string()
}

fn default_session_cookie_age() -> u64 {
    60 * 60 * 24 * 14
}

fn default_kafka_group_id() -> String {
    "my_group".to_string()
}

fn default_kafka_poll_window_ms() -> u64 {
    200
}

fn default_kafka_send_timeout_ms() -> u64 {
    5_000
}

fn default_mongo_database_name() -> String {
    "relay_portal".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.session_cookie_name, "sessionid");
        assert_eq!(config.session_cookie_age, 1_209_600);
        assert_eq!(config.kafka_group_id, "my_group");
        assert_eq!(config.kafka_poll_window(), Duration::from_millis(200));
        assert!(config.is_development());
        assert!(!config.is_production());
    }

    #[test]
    fn envy_fills_missing_fields_with_defaults() {
        let vars = vec![
            ("PORT".to_string(), "8080".to_string()),
            ("ENVIRONMENT".to_string(), "Production".to_string()),
            ("REDIS_URL".to_string(), "redis://localhost:6379/0".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.is_production());
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379/0"));
        assert!(config.kafka_bootstrap_servers.is_none());
        assert_eq!(config.server_address(), "0.0.0.0:8080");
    }
}
