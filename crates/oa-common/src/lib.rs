//! Outlier analysis common types, errors, and configuration.
//!
//! This crate provides foundational types shared across oa-core modules:
//! - Value types describing process scopes, duration statistics and findings
//! - Identity types for flow nodes and process instances
//! - Common error types
//! - Output format definitions
//! - Configuration loading and validation

pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod output;

pub use config::{
    AnalysisConfig, ConfigError, ConfigPaths, ConfigResolver, ConfigSnapshot, LoadedConfig,
};
pub use error::{Error, Result};
pub use id::{FlowNodeId, ProcessInstanceId};
pub use model::{
    DurationChartEntry, FlowNodeDurationStats, FlowNodeFinding, OutlierBounds, OutlierDetail,
    OutlierParameters, OutlierSide, OutlierVariableParameters, ProcessScope, VariableTerm,
};
pub use output::OutputFormat;

/// Schema version of the JSON payloads emitted by oa-core.
pub const SCHEMA_VERSION: &str = "1.0.0";
