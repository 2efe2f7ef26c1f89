//! Configuration file support.
//!
//! A single TOML file with `[progress]`, `[trainer]` and `[dataloader]`
//! sections. Missing sections and keys take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::callbacks::ProgressSettings;
use crate::dataloader::DataLoaderOptions;
use crate::trainer::TrainerSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FastNlpConfig {
    #[serde(default)]
    pub progress: ProgressSettings,

    #[serde(default)]
    pub trainer: TrainerSettings,

    #[serde(default)]
    pub dataloader: DataLoaderOptions,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl FastNlpConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError(msg) => ConfigError::ParseError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::ReadError(format!("Failed to create directory: {}", e)))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::ReadError(format!("Failed to write file: {}", e)))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.progress.print_every == 0 {
            return Err(ConfigError::InvalidValue("progress.print_every must be at least 1".to_string()));
        }
        if self.dataloader.batch_size == 0 {
            return Err(ConfigError::InvalidValue("dataloader.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
