//! Configuration loading and validation.
//!
//! Supports JSON5 format. Config file name: `lambot.json5`, searched in
//! `/etc/lambot/`, `~/.config/lambot/`, then the working directory. The
//! Discord bot token may also come from the `LAMBOT_TOKEN` environment
//! variable, which takes precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// No config file found in any search path.
    #[error("No config file found (searched /etc/lambot, ~/.config/lambot, .)")]
    NotFound,
}

/// Environment variable overriding the Discord bot token.
pub const TOKEN_ENV: &str = "LAMBOT_TOKEN";

const CONFIG_FILE: &str = "lambot.json5";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Discord connection settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Transmission daemon connection settings.
    #[serde(default)]
    pub transmission: TransmissionConfig,
}

impl Config {
    /// Load configuration from the first existing search path.
    ///
    /// # Errors
    ///
    /// Returns error if no config file exists, or if the file cannot be
    /// read, parsed, or validated.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::search_paths()
            .into_iter()
            .find(|p| p.exists())
            .ok_or(ConfigError::NotFound)?;
        Self::load(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = json5::from_str(&content)?;
        config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Candidate config file locations, highest priority first.
    #[must_use]
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/lambot").join(CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config/lambot").join(CONFIG_FILE));
        }
        paths.push(PathBuf::from(CONFIG_FILE));
        paths
    }

    /// Apply environment overrides on top of the file values.
    fn merge_env(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                self.discord.token = Some(token);
            }
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.token.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingField("discord.token".to_string()));
        }

        if self.transmission.port == 0 {
            return Err(ConfigError::Validation(
                "Transmission port cannot be 0".to_string(),
            ));
        }

        if !self.transmission.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Transmission path must start with '/'".to_string(),
            ));
        }

        Ok(())
    }
}

/// Discord connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. Overridable via `LAMBOT_TOKEN`.
    pub token: Option<String>,
}

/// Transmission daemon connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionConfig {
    /// URL scheme, `http` or `https`.
    #[serde(default = "default_proto")]
    pub proto: String,

    /// Daemon host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Daemon RPC port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// RPC endpoint path.
    #[serde(default = "default_path")]
    pub path: String,

    /// RPC username.
    #[serde(default)]
    pub username: String,

    /// RPC password.
    #[serde(default)]
    pub password: String,
}

impl TransmissionConfig {
    /// Compose the full RPC endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.proto, self.host, self.port, self.path)
    }
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            proto: default_proto(),
            host: default_host(),
            port: default_port(),
            path: default_path(),
            username: String::new(),
            password: String::new(),
        }
    }
}

fn default_proto() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    9091
}

fn default_path() -> String {
    "/transmission/rpc".to_string()
}
