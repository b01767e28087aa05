use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to find config directory")]
    NoConfigDir,

    #[error("failed to open config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Settings for running the emulator, loaded from `config.toml`.
#[derive(Default, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Path to the BIOS image.
    pub bios: Option<PathBuf>,
    /// Number of instructions to run. Runs until a host fault if not set.
    pub steps: Option<u64>,
    /// Log filter in the `RUST_LOG` format. The environment variable takes precedence.
    pub log: Option<String>,
}

impl Config {
    /// The config file in the user's config directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = ProjectDirs::from("psxemu", "", "").ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.config_dir().join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&source)?)
    }

    /// Load the config file at the default location, or the default settings if there is none.
    pub fn from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }
}
