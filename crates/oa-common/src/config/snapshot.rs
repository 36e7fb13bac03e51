//! Configuration snapshots for provenance.
//!
//! Captures the active configuration: file path and hash, resolution
//! method, schema version, and a hash of the effective values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resolve::compute_sha256;
use super::{AnalysisConfig, ConfigError, ConfigSource};

/// Configuration snapshot attached to command output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Timestamp when snapshot was created
    pub snapshot_at: DateTime<Utc>,

    /// Hash of the effective configuration values
    pub effective_hash: String,

    /// Where the configuration came from
    pub source: SourceInfo,

    /// Active schema version
    pub schema_version: String,
}

impl ConfigSnapshot {
    pub fn new(config: &AnalysisConfig, source: ConfigSource) -> Result<Self, ConfigError> {
        let effective = serde_json::to_string(config)
            .map_err(|e| ConfigError::Validation(format!("failed to serialize config: {}", e)))?;

        Ok(ConfigSnapshot {
            snapshot_at: Utc::now(),
            effective_hash: compute_sha256(&effective),
            source: SourceInfo::from_config_source(source),
            schema_version: config.schema_version.clone(),
        })
    }

    /// Return true if the configuration is the built-in default.
    pub fn is_default(&self) -> bool {
        self.source.resolution == "default"
    }

    /// Return the snapshot as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "snapshot_at": self.snapshot_at.to_rfc3339(),
            "effective_hash": self.effective_hash,
            "source": {
                "path": self.source.path,
                "hash": self.source.hash,
                "resolution": self.source.resolution,
            },
            "schema_version": self.schema_version,
        })
    }
}

/// Source information for a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Path to the file (None if defaults)
    pub path: Option<String>,

    /// SHA-256 hash of file content (None if defaults)
    pub hash: Option<String>,

    /// How the config was resolved
    pub resolution: String,
}

impl SourceInfo {
    fn from_config_source(source: ConfigSource) -> Self {
        SourceInfo {
            path: source.path,
            hash: source.hash,
            resolution: source.resolution.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::CONFIG_SCHEMA_VERSION;
    use super::*;

    #[test]
    fn test_snapshot_from_defaults() {
        let config = AnalysisConfig::default();
        let snapshot = ConfigSnapshot::new(&config, ConfigSource::defaults()).unwrap();

        assert!(snapshot.is_default());
        assert_eq!(snapshot.effective_hash.len(), 64);
        assert_eq!(snapshot.schema_version, CONFIG_SCHEMA_VERSION);
    }

    #[test]
    fn test_effective_hash_tracks_values() {
        let base = AnalysisConfig::default();
        let tuned = AnalysisConfig {
            std_dev_multiplier: 2.0,
            ..AnalysisConfig::default()
        };
        let a = ConfigSnapshot::new(&base, ConfigSource::defaults()).unwrap();
        let b = ConfigSnapshot::new(&base, ConfigSource::defaults()).unwrap();
        let c = ConfigSnapshot::new(&tuned, ConfigSource::defaults()).unwrap();
        assert_eq!(a.effective_hash, b.effective_hash);
        assert_ne!(a.effective_hash, c.effective_hash);
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot =
            ConfigSnapshot::new(&AnalysisConfig::default(), ConfigSource::defaults()).unwrap();
        let json = snapshot.to_json();

        assert!(json.get("snapshot_at").is_some());
        assert_eq!(json["source"]["resolution"], "default");
        assert!(json["source"]["path"].is_null());
    }
}
