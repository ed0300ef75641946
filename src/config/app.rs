//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! leaderboard, including TOML file loading, environment variable overrides
//! and validation.

use crate::config::rating::RatingSettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub storage: StorageSettings,
    pub rating: RatingSettings,
    pub observer: ObserverSettings,
    pub commands: CommandSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and health reports
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health and metrics endpoints
    pub metrics_port: u16,
}

/// Which storage backend holds the leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            other => Err(anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Data file for the file backend
    pub path: PathBuf,
}

/// Observer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverSettings {
    /// How long a vote waits for model names before it is discarded
    pub name_timeout_ms: u64,
}

/// Command bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Commands that may queue before producers wait
    pub queue_capacity: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "arena-elo".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("arena-elo.json"),
        }
    }
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            name_timeout_ms: 10_000,
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse TOML text. Missing sections and fields keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| anyhow!("Failed to parse configuration: {}", e))
    }

    /// Override fields from variables found by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = lookup("METRICS_PORT") {
            self.service.metrics_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid METRICS_PORT value: {}", port))?;
        }

        // Storage settings
        if let Some(backend) = lookup("STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        // Rating settings
        if let Some(k_factor) = lookup("ELO_K_FACTOR") {
            self.rating.k_factor = k_factor
                .parse()
                .map_err(|_| anyhow!("Invalid ELO_K_FACTOR value: {}", k_factor))?;
        }
        if let Some(score) = lookup("ELO_DEFAULT_SCORE") {
            self.rating.default_score = score
                .parse()
                .map_err(|_| anyhow!("Invalid ELO_DEFAULT_SCORE value: {}", score))?;
        }

        // Observer and command settings
        if let Some(timeout) = lookup("OBSERVER_NAME_TIMEOUT_MS") {
            self.observer.name_timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid OBSERVER_NAME_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Some(capacity) = lookup("COMMAND_QUEUE_CAPACITY") {
            self.commands.queue_capacity = capacity
                .parse()
                .map_err(|_| anyhow!("Invalid COMMAND_QUEUE_CAPACITY value: {}", capacity))?;
        }

        Ok(())
    }

    /// Get observer name timeout as Duration
    pub fn name_timeout(&self) -> Duration {
        Duration::from_millis(self.observer.name_timeout_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.metrics_port == 0 {
        return Err(anyhow!("Metrics port cannot be 0"));
    }

    if config.storage.backend == StorageBackend::File
        && config.storage.path.as_os_str().is_empty()
    {
        return Err(anyhow!("Storage path cannot be empty for the file backend"));
    }

    config.rating.to_elo_config().validate()?;

    if config.observer.name_timeout_ms == 0 {
        return Err(anyhow!("Observer name timeout must be greater than 0"));
    }
    if config.commands.queue_capacity == 0 {
        return Err(anyhow!("Command queue capacity must be greater than 0"));
    }

    Ok(())
}
