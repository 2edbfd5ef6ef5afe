//! Configuration management for TvDrop.
//!
//! This module handles loading, saving, and validating TvDrop configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/tvdrop/config.toml` |
//! | macOS | `~/Library/Application Support/com.tvdrop.TvDrop/config.toml` |
//! | Windows | `%APPDATA%\tvdrop\TvDrop\config\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use tvdrop_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Sharing {}", config.storage.root.display());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct for TvDrop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Shared directory settings
    pub storage: StorageConfig,
    /// Upload completion and progress settings
    pub upload: UploadConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind to localhost only
    pub localhost_only: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            localhost_only: false,
        }
    }
}

/// Shared directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Sandbox root; nothing outside it is ever touched
    pub root: PathBuf,
    /// Initial current directory, relative to the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: directories::BaseDirs::new()
                .map_or_else(|| PathBuf::from("."), |dirs| dirs.home_dir().to_path_buf()),
            start_dir: None,
        }
    }
}

/// Upload session tuning.
///
/// The two idle tiers were tuned empirically; they are configuration, not
/// protocol guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Quiet period after data after which an unconfirmed upload is
    /// presumed finished (zero disables)
    #[serde(with = "humantime_serde")]
    pub grace_window: Duration,
    /// Quiet period after which an upload is abandoned
    #[serde(with = "humantime_serde")]
    pub abandon_timeout: Duration,
    /// How often the per-session watchdog checks for inactivity
    #[serde(with = "humantime_serde")]
    pub idle_check_interval: Duration,
    /// Minimum time between progress notifications
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
    /// Bytes after which a progress notification is sent regardless of time
    pub progress_bytes: u64,
    /// Keep non-empty partial files when an upload is abandoned
    pub keep_partial_on_timeout: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(3),
            abandon_timeout: Duration::from_secs(60),
            idle_check_interval: Duration::from_millis(500),
            progress_interval: Duration::from_secs(1),
            progress_bytes: 1024 * 1024,
            keep_partial_on_timeout: true,
        }
    }
}

impl UploadConfig {
    /// Whether the idle-completion heuristic is enabled.
    #[must_use]
    pub fn grace_enabled(&self) -> bool {
        !self.grace_window.is_zero()
    }

    /// Check the tiers are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.abandon_timeout.is_zero() {
            return Err(invalid("upload.abandon_timeout", "must be greater than zero"));
        }
        if self.grace_enabled() && self.grace_window >= self.abandon_timeout {
            return Err(invalid(
                "upload.grace_window",
                "must be shorter than upload.abandon_timeout",
            ));
        }
        if self.idle_check_interval.is_zero() {
            return Err(invalid("upload.idle_check_interval", "must be greater than zero"));
        }
        if self.progress_interval.is_zero() {
            return Err(invalid("upload.progress_interval", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> Error {
    Error::InvalidConfig {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(&path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.upload.validate()
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tvdrop", "TvDrop")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

/// Parse a human duration such as `500ms`, `3s` or `1m`.
///
/// # Errors
///
/// Returns a description of the problem for malformed input.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let parse = |n: &str| n.trim().parse::<u64>().map_err(|e| e.to_string());

    if let Some(ms) = s.strip_suffix("ms") {
        parse(ms).map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        parse(secs).map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        parse(mins).map(|m| Duration::from_secs(m * 60))
    } else {
        Err(format!("invalid duration format: {s}"))
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
