//! armlite configuration
//!
//! Handles parsing and management of armlite.toml configuration files.

use crate::interp::DEFAULT_MEMORY_SIZE;
use crate::ir::DEFAULT_BUCKETS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`ArmliteConfig::find_and_load`]
pub const CONFIG_FILE_NAME: &str = "armlite.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching armlite.toml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArmliteConfig {
    /// Machine sizing
    #[serde(default)]
    pub machine: MachineConfig,

    /// Defaults for `armlite run`
    #[serde(default)]
    pub run: RunConfig,
}

impl ArmliteConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: ArmliteConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir()?;
        Self::find_and_load(&cwd)
    }

    /// Nearest armlite.toml at or above `start_dir`
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|path| path.exists())
    }

    /// Find and load configuration by searching up from the given directory.
    /// Defaults apply when no file exists.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        match Self::find(start_dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.machine.label_buckets == 0 {
            return Err(ConfigError::Invalid(
                "machine.label_buckets must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Machine sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Memory size in bytes
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,

    /// Label table bucket count
    #[serde(default = "default_label_buckets")]
    pub label_buckets: usize,
}

fn default_memory_size() -> usize {
    DEFAULT_MEMORY_SIZE
}

fn default_label_buckets() -> usize {
    DEFAULT_BUCKETS
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: default_memory_size(),
            label_buckets: default_label_buckets(),
        }
    }
}

/// Run defaults; command line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Print the machine state after each run
    #[serde(default)]
    pub dump_state: bool,

    /// Print a coverage report after each run
    #[serde(default)]
    pub coverage: bool,
}
