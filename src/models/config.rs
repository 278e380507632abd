//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable that overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Longest accepted cache TTL (one year).
pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Longest accepted processing lease (one day).
pub const MAX_LOCK_SECONDS: i64 = 24 * 60 * 60;

/// Largest accepted batch size.
pub const MAX_BATCH_LIMIT: i64 = 10_000;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Outbound HTTP fetch bounds
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Cache expiry policy
    #[serde(default)]
    pub cache: CacheConfig,

    /// Batch sweep defaults
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.database.url = url;
            }
        }
        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::config(format!(
                "database.url is empty; set it or {}",
                DATABASE_URL_ENV
            )));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::validation("database.max_connections must be > 0"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.idle_timeout_secs == 0 {
            return Err(AppError::validation("fetch.idle_timeout_secs must be > 0"));
        }
        if self.fetch.connect_timeout_secs == 0 {
            return Err(AppError::validation("fetch.connect_timeout_secs must be > 0"));
        }
        if self.fetch.max_duration_secs < self.fetch.timeout_secs {
            return Err(AppError::validation(
                "fetch.max_duration_secs must be >= fetch.timeout_secs",
            ));
        }
        if self.fetch.max_body_bytes == 0 {
            return Err(AppError::validation("fetch.max_body_bytes must be > 0"));
        }
        for (name, ttl) in [
            ("cache.ok_ttl_secs", self.cache.ok_ttl_secs),
            ("cache.failure_ttl_secs", self.cache.failure_ttl_secs),
        ] {
            if !(1..=MAX_TTL_SECS).contains(&ttl) {
                return Err(AppError::validation(format!(
                    "{name} must be between 1 and {MAX_TTL_SECS}"
                )));
            }
        }
        self.batch.validate()
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string
    #[serde(default = "defaults::database_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "defaults::max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::database_url(),
            max_connections: defaults::max_connections(),
        }
    }
}

/// Outbound HTTP fetch bounds, shared by every fetch profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of redirects followed per attempt
    #[serde(default = "defaults::max_redirects")]
    pub max_redirects: usize,

    /// Total request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum silence between received bytes, in seconds
    #[serde(default = "defaults::idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Hard ceiling for one attempt, including body streaming
    #[serde(default = "defaults::max_duration")]
    pub max_duration_secs: u64,

    /// Bodies longer than this are truncated, not rejected
    #[serde(default = "defaults::max_body_bytes")]
    pub max_body_bytes: usize,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: defaults::max_redirects(),
            timeout_secs: defaults::timeout(),
            idle_timeout_secs: defaults::idle_timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            max_duration_secs: defaults::max_duration(),
            max_body_bytes: defaults::max_body_bytes(),
        }
    }
}

/// Cache expiry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of an `ok` preview
    #[serde(default = "defaults::ok_ttl")]
    pub ok_ttl_secs: i64,

    /// Lifetime of a `blocked` or `failed` preview
    #[serde(default = "defaults::failure_ttl")]
    pub failure_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ok_ttl_secs: defaults::ok_ttl(),
            failure_ttl_secs: defaults::failure_ttl(),
        }
    }
}

/// Batch sweep defaults; CLI flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum links claimed per run
    #[serde(default = "defaults::batch_limit")]
    pub limit: i64,

    /// Lease length in seconds
    #[serde(default = "defaults::lock_seconds")]
    pub lock_seconds: i64,
}

impl BatchConfig {
    /// Check limit and lease bounds; also used for CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_LIMIT).contains(&self.limit) {
            return Err(AppError::validation(format!(
                "batch.limit must be between 1 and {MAX_BATCH_LIMIT}"
            )));
        }
        if !(1..=MAX_LOCK_SECONDS).contains(&self.lock_seconds) {
            return Err(AppError::validation(format!(
                "batch.lock_seconds must be between 1 and {MAX_LOCK_SECONDS}"
            )));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            limit: defaults::batch_limit(),
            lock_seconds: defaults::lock_seconds(),
        }
    }
}

mod defaults {
    // Database defaults
    pub fn database_url() -> String {
        "postgres://localhost/giftlist".into()
    }
    pub fn max_connections() -> u32 {
        5
    }

    // Fetch defaults
    pub fn max_redirects() -> usize {
        5
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn idle_timeout() -> u64 {
        8
    }
    pub fn connect_timeout() -> u64 {
        5
    }
    pub fn max_duration() -> u64 {
        12
    }
    pub fn max_body_bytes() -> usize {
        1_536 * 1024
    }

    // Cache defaults
    pub fn ok_ttl() -> i64 {
        7 * 24 * 60 * 60
    }
    pub fn failure_ttl() -> i64 {
        2 * 60 * 60
    }

    // Batch defaults
    pub fn batch_limit() -> i64 {
        25
    }
    pub fn lock_seconds() -> i64 {
        300
    }
}
