//! Configuration resolution for outlier analysis.
//!
//! Implements deterministic config resolution order:
//! 1. Explicit CLI flag (--config)
//! 2. Environment variable (OA_CONFIG)
//! 3. XDG config (`$XDG_CONFIG_HOME/outlier_analysis/config.json`)
//! 4. Built-in defaults

use std::env;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use super::{AnalysisConfig, ConfigError, ConfigResolution, ConfigSource};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "OA_CONFIG";

const CONFIG_DIR_NAME: &str = "outlier_analysis";
const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration file paths.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit path to config.json
    pub config_path: Option<PathBuf>,
}

/// Configuration resolver with deterministic resolution order.
#[derive(Debug)]
pub struct ConfigResolver {
    /// Paths from CLI flags
    cli_paths: ConfigPaths,
    /// Value of OA_CONFIG at construction
    env_path: Option<PathBuf>,
    /// Base XDG config directory at construction
    config_home: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create a new resolver with CLI paths, capturing the environment.
    pub fn new(paths: ConfigPaths) -> Self {
        let config_home = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(dirs::config_dir);
        ConfigResolver {
            cli_paths: paths,
            env_path: env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
            config_home,
        }
    }

    /// Create a resolver with no CLI overrides.
    pub fn with_defaults() -> Self {
        Self::new(ConfigPaths::default())
    }

    /// Directory searched for `config.json` when no explicit path is given.
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.config_home.as_ref().map(|d| d.join(CONFIG_DIR_NAME))
    }

    /// Resolve the config file path.
    pub fn resolve_config_path(&self) -> (Option<PathBuf>, ConfigResolution) {
        // 1. CLI flag
        if let Some(ref path) = self.cli_paths.config_path {
            return (Some(path.clone()), ConfigResolution::CliFlag);
        }

        // 2. OA_CONFIG env var
        if let Some(ref path) = self.env_path {
            return (Some(path.clone()), ConfigResolution::EnvVar);
        }

        // 3. XDG config dir, only if the file is there
        if let Some(dir) = self.config_dir() {
            let path = dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                return (Some(path), ConfigResolution::XdgConfig);
            }
        }

        // 4. Default
        (None, ConfigResolution::Default)
    }

    /// Load the config from the resolved path or defaults.
    ///
    /// An explicitly named file (CLI or env) that does not exist is an error.
    pub fn load(&self) -> Result<(AnalysisConfig, ConfigSource), ConfigError> {
        let (path, resolution) = self.resolve_config_path();

        let Some(p) = path else {
            return Ok((AnalysisConfig::default(), ConfigSource::defaults()));
        };

        if !p.exists() {
            return Err(ConfigError::NotFound { path: p });
        }

        let content = fs::read_to_string(&p).map_err(|e| ConfigError::IoError {
            path: p.clone(),
            source: e,
        })?;

        let hash = compute_sha256(&content);

        let config: AnalysisConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: p.clone(),
                source: e,
            })?;

        config.validate()?;

        Ok((
            config,
            ConfigSource {
                path: Some(p.to_string_lossy().to_string()),
                hash: Some(hash),
                resolution,
            },
        ))
    }
}

/// Compute SHA-256 hash of a string.
pub(crate) fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
