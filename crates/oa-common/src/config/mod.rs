//! Configuration loading and validation for outlier analysis.
//!
//! This module provides:
//! - The typed [`AnalysisConfig`] with built-in defaults
//! - Deterministic config resolution (CLI > env > XDG > defaults)
//! - Semantic validation
//! - Config snapshots for provenance

pub mod analysis;
pub mod resolve;
pub mod snapshot;

pub use analysis::{AnalysisConfig, CONFIG_SCHEMA_VERSION};
pub use resolve::{ConfigPaths, ConfigResolver};
pub use snapshot::ConfigSnapshot;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while locating, reading, or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("semantic validation failed: {0}")]
    Validation(String),

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ConfigError {
    /// The file the error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::NotFound { path }
            | ConfigError::ParseError { path, .. }
            | ConfigError::IoError { path, .. } => Some(path.as_path()),
            ConfigError::Validation(_) | ConfigError::VersionMismatch { .. } => None,
        }
    }
}

/// Configuration source for a file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file, or None if using defaults
    pub path: Option<String>,
    /// SHA-256 hash of file contents, or None if defaults
    pub hash: Option<String>,
    /// How this source was resolved
    pub resolution: ConfigResolution,
}

impl ConfigSource {
    pub fn defaults() -> Self {
        ConfigSource {
            path: None,
            hash: None,
            resolution: ConfigResolution::Default,
        }
    }
}

/// How a config file was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// From explicit CLI flag
    CliFlag,
    /// From the OA_CONFIG environment variable
    EnvVar,
    /// From XDG config directory
    XdgConfig,
    /// Using built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::CliFlag => write!(f, "cli"),
            ConfigResolution::EnvVar => write!(f, "env"),
            ConfigResolution::XdgConfig => write!(f, "xdg"),
            ConfigResolution::Default => write!(f, "default"),
        }
    }
}

/// A loaded configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AnalysisConfig,
    pub snapshot: ConfigSnapshot,
}

impl LoadedConfig {
    /// Resolve, read, and validate configuration.
    pub fn load(resolver: &ConfigResolver) -> Result<Self, ConfigError> {
        let (config, source) = resolver.load()?;
        let snapshot = ConfigSnapshot::new(&config, source)?;
        Ok(LoadedConfig { config, snapshot })
    }

    /// Built-in defaults only.
    pub fn defaults() -> Result<Self, ConfigError> {
        let config = AnalysisConfig::default();
        let snapshot = ConfigSnapshot::new(&config, ConfigSource::defaults())?;
        Ok(LoadedConfig { config, snapshot })
    }
}
