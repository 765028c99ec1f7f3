//! ChunkStore configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::{FailureMode, StoreOptions};

/// Main ChunkStore configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database backing the store
    #[serde(rename = "store-path")]
    pub store_path: PathBuf,

    /// Values at or above this many serialized bytes are chunked
    #[serde(rename = "chunk-size")]
    pub chunk_size: usize,

    /// Soft budget for the total size of all stored values
    #[serde(rename = "max-total-size")]
    pub max_total_size: usize,

    /// Key substrings evicted when the budget would be exceeded
    #[serde(rename = "eviction-markers")]
    pub eviction_markers: Vec<String>,

    /// Whether medium failures are skipped or reported
    #[serde(rename = "failure-mode")]
    pub failure_mode: FailureMode,
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chunkstore")
        .join("store.db")
}

impl Default for Config {
    fn default() -> Self {
        let options = StoreOptions::default();
        Self {
            store_path: default_store_path(),
            chunk_size: options.chunk_size,
            max_total_size: options.max_total_size,
            eviction_markers: options.eviction_markers,
            failure_mode: options.failure_mode,
        }
    }
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(eyre::eyre!("chunk-size must be greater than zero"));
        }
        if self.max_total_size == 0 {
            return Err(eyre::eyre!("max-total-size must be greater than zero"));
        }
        if self.eviction_markers.iter().any(String::is_empty) {
            return Err(eyre::eyre!("eviction-markers must not contain empty strings"));
        }
        Ok(())
    }

    /// Load configuration from `config_path`, or the first readable default location
    ///
    /// An explicit path must load. Default locations that fail to parse are
    /// skipped with a warning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::read(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::default_paths().iter().filter(|p| p.exists()) {
            match Self::read(path) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable config"),
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Project-local `.chunkstore.yml`, then the per-user config file
    fn default_paths() -> Vec<PathBuf> {
        let user = dirs::config_dir().map(|dir| dir.join("chunkstore").join("chunkstore.yml"));
        std::iter::once(PathBuf::from(".chunkstore.yml")).chain(user).collect()
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Store options derived from this configuration
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            chunk_size: self.chunk_size,
            max_total_size: self.max_total_size,
            eviction_markers: self.eviction_markers.clone(),
            failure_mode: self.failure_mode,
        }
    }
}
