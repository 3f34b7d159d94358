//! Configuration management
//!
//! This module handles loading and parsing configuration for the Streaks service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The session
//! signing secret has no default: the service refuses to start without one.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session/authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Day boundary configuration for streak evaluation
    #[serde(default)]
    pub streak: StreakConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/streaks.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Session lifetime in days
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

fn default_session_ttl_days() -> i64 {
    7
}

/// Longest accepted session lifetime, in days
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

impl AuthConfig {
    /// The configured signing secret, or an error if it is missing or blank.
    pub fn secret(&self) -> Result<&str, ConfigError> {
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => Ok(secret),
            _ => Err(ConfigError::ValidationError(
                "auth.jwt_secret is not set (use STREAKS_JWT_SECRET)".to_string(),
            )),
        }
    }
}

/// Streak evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Fixed offset from UTC, in minutes, that defines local day boundaries.
    /// Defaults to UTC-07:00 (America/Phoenix, which has no DST).
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

fn default_utc_offset_minutes() -> i32 {
    -7 * 60
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Handle empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - STREAKS_SERVER_HOST
    /// - STREAKS_SERVER_PORT
    /// - STREAKS_SERVER_CORS_ORIGIN
    /// - STREAKS_DATABASE_DRIVER
    /// - STREAKS_DATABASE_URL
    /// - STREAKS_JWT_SECRET
    /// - STREAKS_SESSION_TTL_DAYS
    /// - STREAKS_UTC_OFFSET_MINUTES
    ///
    /// The merged result is validated before it is returned.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&self.auth.session_ttl_days) {
            return Err(ConfigError::ValidationError(format!(
                "auth.session_ttl_days must be between 1 and {}, got {}",
                MAX_SESSION_TTL_DAYS, self.auth.session_ttl_days
            )));
        }
        if self.streak.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::ValidationError(format!(
                "streak.utc_offset_minutes must be within ±1439, got {}",
                self.streak.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("STREAKS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("STREAKS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("STREAKS_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("STREAKS_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("STREAKS_DATABASE_URL") {
            self.database.url = url;
        }

        // Auth configuration
        if let Ok(secret) = std::env::var("STREAKS_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Ok(days) = std::env::var("STREAKS_SESSION_TTL_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.session_ttl_days = days;
            }
        }

        // Streak configuration
        if let Ok(offset) = std::env::var("STREAKS_UTC_OFFSET_MINUTES") {
            if let Ok(offset) = offset.parse::<i32>() {
                self.streak.utc_offset_minutes = offset;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "STREAKS_SERVER_HOST",
    "STREAKS_SERVER_PORT",
    "STREAKS_SERVER_CORS_ORIGIN",
    "STREAKS_DATABASE_DRIVER",
    "STREAKS_DATABASE_URL",
    "STREAKS_JWT_SECRET",
    "STREAKS_SESSION_TTL_DAYS",
    "STREAKS_UTC_OFFSET_MINUTES",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}
