use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::alerts::SubscriptionLimits;
use crate::error::ConfigError;
use crate::price::DEFAULT_TICKER_URL;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub database: DatabaseConfig,
    pub price: PriceConfig,
    pub server: ServerConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

/// Full node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Base URL of the node's HTTP API
    pub url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Delay before retrying a height that failed or is not produced yet
    pub backoff_ms: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
    /// Enable WAL mode for better concurrency
    pub enable_wal_mode: bool,
    /// Database busy timeout in milliseconds
    pub busy_timeout_ms: u32,
}

/// Market price relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    pub enabled: bool,
    /// Ticker endpoint
    pub api_url: String,
    /// Asset name a ticker must carry to be accepted
    pub asset_name: String,
    /// Refresh period in milliseconds
    pub update_interval_ms: u64,
    pub timeout_seconds: u64,
}

/// WebSocket / status server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Subscription table bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub max_subscriptions_per_address: usize,
    pub max_total_subscriptions: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8091".to_string(),
            timeout_seconds: 30,
            backoff_ms: 1000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./relay.db".to_string(),
            enable_wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: DEFAULT_TICKER_URL.to_string(),
            asset_name: "TRON".to_string(),
            update_interval_ms: 60_000,
            timeout_seconds: 15,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8088,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        let limits = SubscriptionLimits::default();
        Self {
            max_subscriptions_per_address: limits.max_per_address,
            max_total_subscriptions: limits.max_total,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl PriceConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AlertsConfig {
    pub fn limits(&self) -> SubscriptionLimits {
        SubscriptionLimits {
            max_per_address: self.max_subscriptions_per_address,
            max_total: self.max_total_subscriptions,
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the TOML file named by `CONFIG_FILE`
    /// (default `config.toml`); a missing file yields defaults
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("NODE_URL") {
            self.node.url = url;
        }
        if let Some(timeout) = parse_env("NODE_TIMEOUT_SECONDS")? {
            self.node.timeout_seconds = timeout;
        }
        if let Some(backoff) = parse_env("BLOCK_BACKOFF_MS")? {
            self.node.backoff_ms = backoff;
        }

        if let Ok(path) = env::var("STORE_FILE") {
            self.database.path = path;
        }

        if let Ok(url) = env::var("PRICE_API_URL") {
            self.price.api_url = url;
        }
        if let Some(interval) = parse_env("PRICE_UPDATING_INTERVAL")? {
            self.price.update_interval_ms = interval;
        }
        if let Some(enabled) = parse_env("PRICE_ENABLED")? {
            self.price.enabled = enabled;
        }

        if let Some(port) = parse_env("WEBSOCKET_PORT")? {
            self.server.port = port;
        }
        if let Ok(host) = env::var("WEBSOCKET_HOST") {
            self.server.host = host;
        }

        if let Some(limit) = parse_env("MAX_SUBSCRIPTIONS_PER_ADDRESS")? {
            self.alerts.max_subscriptions_per_address = limit;
        }
        if let Some(limit) = parse_env("MAX_TOTAL_SUBSCRIPTIONS")? {
            self.alerts.max_total_subscriptions = limit;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.node.url) {
            return Err(ConfigError::InvalidUrl(self.node.url.clone()));
        }

        if self.node.timeout_seconds == 0 || self.node.timeout_seconds > 300 {
            return Err(invalid("node.timeout_seconds", self.node.timeout_seconds));
        }

        if self.node.backoff_ms == 0 {
            return Err(invalid("node.backoff_ms", self.node.backoff_ms));
        }

        if self.database.path.trim().is_empty() {
            return Err(invalid("database.path", &self.database.path));
        }

        if self.price.enabled {
            if !is_http_url(&self.price.api_url) {
                return Err(ConfigError::InvalidUrl(self.price.api_url.clone()));
            }
            if self.price.update_interval_ms < 1000 {
                return Err(invalid("price.update_interval_ms", self.price.update_interval_ms));
            }
            if self.price.asset_name.trim().is_empty() {
                return Err(invalid("price.asset_name", &self.price.asset_name));
            }
        }

        if self.server.port == 0 {
            return Err(invalid("server.port", self.server.port));
        }

        if self.alerts.max_subscriptions_per_address == 0 {
            return Err(invalid(
                "alerts.max_subscriptions_per_address",
                self.alerts.max_subscriptions_per_address,
            ));
        }
        if self.alerts.max_total_subscriptions < self.alerts.max_subscriptions_per_address {
            return Err(invalid(
                "alerts.max_total_subscriptions",
                self.alerts.max_total_subscriptions,
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging.level", &self.logging.level));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid("logging.format", &self.logging.format));
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parsing(e.to_string()))?;
        fs::write(path, content).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
