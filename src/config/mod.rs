//! Configuration management for the svitlo service
//!
//! Configuration is loaded from environment variables or a TOML file.
//! All timestamps served by the API use the utility's civil timezone,
//! configured here (Kyiv observes DST, so an IANA zone name is required
//! rather than a fixed offset).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Default upstream schedule page
pub const DEFAULT_SOURCE_URL: &str = "https://hoe.com.ua/page/pogodinni-vidkljuchennja";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upstream source configuration
    pub source: SourceConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// API server configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Schedule page URL
    pub url: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum retry attempts on transient failure
    pub max_retries: u32,

    /// IANA timezone of the utility's civil time
    pub timezone: Tz,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Periodic ingestion interval in seconds; 0 disables the timer
    pub update_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SVITLO_SOURCE_URL") {
            config.source.url = url;
        }
        if let Some(timeout) = env_parse::<u64>("SVITLO_REQUEST_TIMEOUT") {
            config.source.request_timeout_secs = timeout;
        }
        if let Some(retries) = env_parse::<u32>("SVITLO_MAX_RETRIES") {
            config.source.max_retries = retries;
        }
        if let Ok(tz) = std::env::var("SVITLO_TIMEZONE") {
            config.source.timezone = tz
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid SVITLO_TIMEZONE {tz}: {e}"))?;
        }
        if let Ok(path) = std::env::var("SVITLO_DB_PATH") {
            config.storage.db_path = path.into();
        }
        if let Ok(host) = std::env::var("SVITLO_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("SVITLO_PORT") {
            config.server.port = port;
        }
        if let Some(interval) = env_parse::<u64>("SVITLO_UPDATE_INTERVAL") {
            config.server.update_interval_secs = interval;
        }
        if let Ok(level) = std::env::var("SVITLO_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("SVITLO_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.source.url.is_empty() {
            anyhow::bail!("source.url must not be empty");
        }

        if self.source.request_timeout_secs == 0 {
            anyhow::bail!("source.request_timeout_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                url: String::from(DEFAULT_SOURCE_URL),
                request_timeout_secs: 15,
                max_retries: 3,
                timezone: chrono_tz::Europe::Kyiv,
            },
            storage: StorageConfig {
                db_path: PathBuf::from("data/outages.db"),
            },
            server: ServerConfig {
                host: String::from("0.0.0.0"),
                port: 8000,
                update_interval_secs: 0,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
