//! Tunables of the outlier analysis engine.
//!
//! Every operation receives an [`AnalysisConfig`] explicitly; nothing is read
//! from global state.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Schema version for the analysis configuration file.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Largest significance level accepted by the variable analysis.
const MAX_SIGNIFICANCE_LEVEL: f64 = 0.5;

/// Analysis configuration, loaded from `config.json` or built in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Schema version for compatibility checking
    pub schema_version: String,

    /// Multiple of the standard deviation a bound sits away from the mean
    pub std_dev_multiplier: f64,

    /// Minimum distance (ms) between the mean and either bound
    pub minimum_deviation_from_avg: f64,

    /// Upper limit on the number of duration chart buckets
    pub target_bucket_count: i64,

    /// Significance level of the outlier/non-outlier term comparison
    pub significance_level: f64,

    /// Number of terms sampled per variable
    pub sample_size: usize,

    /// Terms seen fewer times than this among outliers are ignored
    pub min_term_occurrences: u64,

    /// Maximum number of flow nodes or variable names per aggregation
    pub aggregation_bucket_limit: usize,

    /// Total instance ids returned by an outlier instance export
    pub export_limit: usize,

    /// Largest page the aggregate store serves in one request
    pub max_page_size: usize,

    /// Flow-node types left out of the findings map
    pub excluded_flow_node_types: Vec<String>,

    /// Flow-node types kept when only human tasks are requested
    pub human_task_types: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            std_dev_multiplier: 1.5,
            minimum_deviation_from_avg: 0.0,
            target_bucket_count: 80,
            significance_level: 0.001,
            sample_size: 100,
            min_term_occurrences: 3,
            aggregation_bucket_limit: 1000,
            export_limit: 1000,
            max_page_size: 10_000,
            excluded_flow_node_types: [
                "exclusiveGateway",
                "inclusiveGateway",
                "parallelGateway",
                "eventBasedGateway",
                "complexGateway",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            human_task_types: vec!["userTask".to_string()],
        }
    }
}

impl AnalysisConfig {
    /// Validate semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::VersionMismatch {
                expected: CONFIG_SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if !(self.std_dev_multiplier.is_finite() && self.std_dev_multiplier > 0.0) {
            return Err(ConfigError::Validation(format!(
                "std_dev_multiplier must be positive (got {})",
                self.std_dev_multiplier
            )));
        }

        if !(self.minimum_deviation_from_avg.is_finite() && self.minimum_deviation_from_avg >= 0.0)
        {
            return Err(ConfigError::Validation(format!(
                "minimum_deviation_from_avg must be >= 0 (got {})",
                self.minimum_deviation_from_avg
            )));
        }

        if self.target_bucket_count < 1 {
            return Err(ConfigError::Validation(format!(
                "target_bucket_count must be >= 1 (got {})",
                self.target_bucket_count
            )));
        }

        if !(self.significance_level > 0.0 && self.significance_level <= MAX_SIGNIFICANCE_LEVEL) {
            return Err(ConfigError::Validation(format!(
                "significance_level must be in (0, {}] (got {})",
                MAX_SIGNIFICANCE_LEVEL, self.significance_level
            )));
        }

        let limits = [
            ("sample_size", self.sample_size),
            ("aggregation_bucket_limit", self.aggregation_bucket_limit),
            ("export_limit", self.export_limit),
            ("max_page_size", self.max_page_size),
        ];
        for (name, value) in limits {
            if value < 1 {
                return Err(ConfigError::Validation(format!(
                    "{} must be >= 1 (got {})",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Page size used when listing outlier instances.
    pub fn instance_page_size(&self) -> usize {
        self.export_limit.min(self.max_page_size)
    }
}
