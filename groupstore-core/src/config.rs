//! Configuration loading and management
//!
//! Configuration is optional. When present it lives at
//! `<base_dir>/groupstore.toml`; every section falls back to defaults.
//!
//! All paths in the configuration are relative to the base directory the
//! store is opened against. Nothing here consults the process working
//! directory or the environment.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Name of the optional config file inside the base directory
pub const CONFIG_FILE_NAME: &str = "groupstore.toml";

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how the database file is opened
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Database file path relative to the base directory
    #[serde(default = "default_relative_path")]
    pub relative_path: PathBuf,

    /// How long to wait for another writer's lock, in milliseconds
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// Use write-ahead logging so readers don't block on the writer
    #[serde(default = "default_wal")]
    pub wal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            relative_path: default_relative_path(),
            busy_timeout_ms: default_busy_timeout(),
            wal: default_wal(),
        }
    }
}

impl StoreConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.relative_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "store.relative_path must not be empty".to_string(),
            ));
        }
        if self.relative_path.is_absolute() {
            return Err(Error::Config(format!(
                "store.relative_path must be relative, got {:?}",
                self.relative_path
            )));
        }
        if self
            .relative_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::Config(format!(
                "store.relative_path must stay inside the base directory, got {:?}",
                self.relative_path
            )));
        }
        if self.relative_path.file_name().is_none() {
            return Err(Error::Config(format!(
                "store.relative_path must name a file, got {:?}",
                self.relative_path
            )));
        }
        Ok(())
    }

    /// Returns the database file path under `base_dir`
    pub fn database_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.relative_path)
    }
}

fn default_relative_path() -> PathBuf {
    PathBuf::from("var/entities.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_wal() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// Log directory relative to the base directory
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            dir: default_log_dir(),
        }
    }
}

impl LoggingConfig {
    /// Returns the log directory under `base_dir`
    pub fn log_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.dir)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("var/log")
}

impl Config {
    /// Load configuration for a base directory
    ///
    /// Reads `<base_dir>/groupstore.toml` if it exists, otherwise returns defaults.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let config_path = Self::config_path(base_dir);

        if !config_path.exists() {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.store.validate()?;
        Ok(config)
    }

    /// Returns the config file path for a base directory
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_NAME)
    }
}
