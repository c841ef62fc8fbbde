//! Configuration management
//!
//! Loads and saves `config.toml` from the rsu configuration directory.
//! A missing file yields the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::error::{Error, Result, StatusCode};
use crate::retry::RetryConfig;
use crate::upload::{DEFAULT_CHUNK_SIZE, aligned_chunk_size};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "RSU_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";
const SCHEMA_VERSION: u32 = 1;

/// Default endpoint of the JSON API
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Streaming upload settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes per chunk, rounded up to the upload quantum
    pub chunk_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl UploadConfig {
    pub fn aligned_chunk_size(&self) -> usize {
        aligned_chunk_size(self.chunk_size)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Replaces the default transient code table when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transient_codes: Option<Vec<StatusCode>>,
    pub retry: RetryConfig,
    pub upload: UploadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project: None,
            transient_codes: None,
            retry: RetryConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    pub fn classifier(&self) -> Classifier {
        match &self.transient_codes {
            Some(codes) => Classifier::with_transient_codes(codes.iter().copied()),
            None => Classifier::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "unsupported schema version {} (max {SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint cannot be empty".to_string()));
        }
        if self.upload.chunk_size == 0 {
            return Err(Error::Config("upload.chunk_size must be positive".to_string()));
        }
        self.retry.validate()
    }
}

/// Reads and writes the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use `$RSU_CONFIG_DIR` or the platform configuration directory
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))?
                .join("rsu"),
        };
        Ok(Self::with_dir(dir))
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: dir.as_ref().join(CONFIG_FILE),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", self.config_path.display()))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse {}: {e}", self.config_path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(&self.config_path, content).map_err(|e| {
            Error::Config(format!("failed to write {}: {e}", self.config_path.display()))
        })?;

        tracing::debug!(path = %self.config_path.display(), "Saved configuration");
        Ok(())
    }
}
