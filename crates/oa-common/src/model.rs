//! Value types exchanged between the analysis engine and its callers.
//!
//! Everything here is transient: recomputed per request from the current
//! aggregate population and never persisted. Durations are milliseconds.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::FlowNodeId;

/// Version sentinel meaning "the newest deployed version".
pub const LATEST_VERSION: &str = "latest";

/// Version sentinel meaning "every deployed version".
pub const ALL_VERSIONS: &str = "all";

/// Which process instances a request looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessScope {
    pub process_definition_key: String,
    /// Ordered list of versions; may contain [`LATEST_VERSION`] or [`ALL_VERSIONS`].
    #[serde(default = "default_versions")]
    pub definition_versions: Vec<String>,
    /// Tenants to include. Empty means no tenant restriction.
    #[serde(default)]
    pub tenant_ids: Vec<String>,
}

fn default_versions() -> Vec<String> {
    vec![ALL_VERSIONS.to_string()]
}

impl ProcessScope {
    /// Scope covering every version and tenant of a process definition.
    pub fn new(process_definition_key: impl Into<String>) -> Self {
        ProcessScope {
            process_definition_key: process_definition_key.into(),
            definition_versions: default_versions(),
            tenant_ids: Vec::new(),
        }
    }

    pub fn with_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tenants<I, S>(mut self, tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenant_ids = tenants.into_iter().map(Into::into).collect();
        self
    }

    /// True when no version filter applies. An empty version list counts as "all".
    pub fn includes_all_versions(&self) -> bool {
        self.definition_versions.is_empty()
            || self
                .definition_versions
                .iter()
                .any(|v| v.eq_ignore_ascii_case(ALL_VERSIONS))
    }

    pub fn includes_latest_version(&self) -> bool {
        self.definition_versions
            .iter()
            .any(|v| v.eq_ignore_ascii_case(LATEST_VERSION))
    }

    pub fn includes_tenant(&self, tenant_id: Option<&str>) -> bool {
        if self.tenant_ids.is_empty() {
            return true;
        }
        match tenant_id {
            Some(t) => self.tenant_ids.iter().any(|id| id == t),
            None => false,
        }
    }
}

/// Duration distribution of one flow node within a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNodeDurationStats {
    pub flow_node_id: FlowNodeId,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_deviation: f64,
}

impl FlowNodeDurationStats {
    /// Stats of a flow node with no recorded executions.
    pub fn empty(flow_node_id: FlowNodeId) -> Self {
        FlowNodeDurationStats {
            flow_node_id,
            count: 0,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            std_deviation: 0.0,
        }
    }

    /// Population statistics over raw durations.
    pub fn from_durations(flow_node_id: FlowNodeId, durations: &[f64]) -> Self {
        if durations.is_empty() {
            return Self::empty(flow_node_id);
        }
        let n = durations.len() as f64;
        let mean = durations.iter().sum::<f64>() / n;
        let variance = durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        FlowNodeDurationStats {
            flow_node_id,
            count: durations.len() as u64,
            min: durations.iter().copied().fold(f64::INFINITY, f64::min),
            max: durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std_deviation: variance.sqrt(),
        }
    }
}

/// Outlier thresholds of one flow node. A missing side has no outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub flow_node_id: FlowNodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound_value: Option<f64>,
}

impl OutlierBounds {
    pub fn none(flow_node_id: FlowNodeId) -> Self {
        OutlierBounds {
            flow_node_id,
            lower_bound_value: None,
            upper_bound_value: None,
        }
    }

    pub fn has_any(&self) -> bool {
        self.lower_bound_value.is_some() || self.upper_bound_value.is_some()
    }
}

/// One histogram bucket of a flow node's duration chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationChartEntry {
    pub duration_bucket_start: i64,
    pub count: u64,
    pub is_outlier: bool,
}

/// Side of the distribution an outlier lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierSide {
    Lower,
    Higher,
}

impl std::fmt::Display for OutlierSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutlierSide::Lower => write!(f, "lower"),
            OutlierSide::Higher => write!(f, "higher"),
        }
    }
}

/// Outlier population on one side of a flow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierDetail {
    /// Bound truncated to whole milliseconds.
    pub bound_value: i64,
    pub ratio_within_flow_node: f64,
    pub count: u64,
    /// How far the mean sits from the bound, always >= 1 for a valid bound.
    pub severity: f64,
}

/// Outlier summary of one flow node, with heat relative to the whole scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNodeFinding {
    pub flow_node_id: FlowNodeId,
    pub total_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_outlier: Option<OutlierDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher_outlier: Option<OutlierDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_outlier_heat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher_outlier_heat: Option<f64>,
    #[serde(default)]
    pub heat: f64,
}

impl FlowNodeFinding {
    /// Finding with raw counts only; heat is filled in by the heat pass.
    pub fn new(flow_node_id: FlowNodeId, total_count: u64) -> Self {
        FlowNodeFinding {
            flow_node_id,
            total_count,
            lower_outlier: None,
            higher_outlier: None,
            lower_outlier_heat: None,
            higher_outlier_heat: None,
            heat: 0.0,
        }
    }

    pub fn lower_count(&self) -> u64 {
        self.lower_outlier.as_ref().map_or(0, |o| o.count)
    }

    pub fn higher_count(&self) -> u64 {
        self.higher_outlier.as_ref().map_or(0, |o| o.count)
    }

    pub fn outlier_count(&self) -> u64 {
        self.lower_count() + self.higher_count()
    }

    pub fn side(&self, side: OutlierSide) -> Option<&OutlierDetail> {
        match side {
            OutlierSide::Lower => self.lower_outlier.as_ref(),
            OutlierSide::Higher => self.higher_outlier.as_ref(),
        }
    }
}

/// A variable value over-represented among a flow node's outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableTerm {
    pub variable_name: String,
    pub term: String,
    pub outlier_instance_count: u64,
    pub ratio_in_outlier_set: f64,
    pub ratio_in_non_outlier_set: f64,
    pub ratio_of_total_instances: f64,
}

/// Flow node plus its outlier thresholds, as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierParameters {
    pub process_scope: ProcessScope,
    pub flow_node_id: FlowNodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_outlier_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher_outlier_bound: Option<f64>,
}

impl OutlierParameters {
    pub fn new(process_scope: ProcessScope, flow_node_id: impl Into<FlowNodeId>) -> Self {
        OutlierParameters {
            process_scope,
            flow_node_id: flow_node_id.into(),
            lower_outlier_bound: None,
            higher_outlier_bound: None,
        }
    }

    pub fn with_bounds(mut self, lower: Option<f64>, higher: Option<f64>) -> Self {
        self.lower_outlier_bound = lower;
        self.higher_outlier_bound = higher;
        self
    }

    /// Fails unless at least one bound is present and every present bound is finite.
    pub fn require_bounds(&self) -> Result<()> {
        if self.lower_outlier_bound.is_none() && self.higher_outlier_bound.is_none() {
            return Err(Error::MissingOutlierBounds);
        }
        for bound in [self.lower_outlier_bound, self.higher_outlier_bound]
            .into_iter()
            .flatten()
        {
            if !bound.is_finite() {
                return Err(Error::Validation(format!(
                    "outlier bound must be finite (got {})",
                    bound
                )));
            }
        }
        Ok(())
    }

    pub fn bounds(&self) -> OutlierBounds {
        OutlierBounds {
            flow_node_id: self.flow_node_id.clone(),
            lower_bound_value: self.lower_outlier_bound,
            upper_bound_value: self.higher_outlier_bound,
        }
    }
}

/// Outlier parameters narrowed to one variable value, for instance export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierVariableParameters {
    #[serde(flatten)]
    pub outlier: OutlierParameters,
    pub variable_name: String,
    pub variable_term: String,
}
