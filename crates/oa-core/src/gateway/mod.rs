//! Aggregate store gateway.
//!
//! The engine never sees raw process instances. Everything it needs comes
//! through the aggregate primitives of [`AggregateStoreGateway`]: duration
//! statistics, histograms, bounded counts, term samples, and a paged list of
//! matching instance ids. Any store that can answer these (a document store,
//! a SQL warehouse, or the in-memory [`InMemoryGateway`]) can back the engine.

pub mod memory;

pub use memory::{Dataset, InMemoryGateway};

use std::collections::{BTreeMap, BTreeSet};

use oa_common::{
    Error, FlowNodeDurationStats, FlowNodeId, OutlierBounds, ProcessInstanceId, ProcessScope,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by an aggregate store.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The store holds no data for the process definition. Callers treat
    /// this as an empty population, not as a failure.
    #[error("no instance index for process definition '{process_definition_key}'")]
    IndexNotFound { process_definition_key: String },

    #[error("aggregate store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid aggregate query: {0}")]
    InvalidQuery(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl From<GatewayError> for Error {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::IndexNotFound { .. } | GatewayError::Unavailable(_) => {
                Error::Gateway(err.to_string())
            }
            GatewayError::InvalidQuery(msg) => Error::InvalidQuery(msg),
        }
    }
}

/// Duration condition on a single flow-node execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationPredicate {
    /// Strictly below `lower` or strictly above `upper`. Matches nothing
    /// when both are absent.
    Outside {
        lower: Option<f64>,
        upper: Option<f64>,
    },
    /// Within `[lower, upper]` inclusive; an absent side is unbounded.
    Within {
        lower: Option<f64>,
        upper: Option<f64>,
    },
}

impl DurationPredicate {
    pub fn matches(&self, duration: f64) -> bool {
        match *self {
            DurationPredicate::Outside { lower, upper } => {
                lower.is_some_and(|l| duration < l) || upper.is_some_and(|u| duration > u)
            }
            DurationPredicate::Within { lower, upper } => {
                lower.map_or(true, |l| duration >= l) && upper.map_or(true, |u| duration <= u)
            }
        }
    }
}

/// Executions of one flow node whose duration satisfies a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNodePredicate {
    pub flow_node_id: FlowNodeId,
    pub duration: DurationPredicate,
}

impl FlowNodePredicate {
    /// Outlier executions: outside the bounds on either present side.
    pub fn outliers(bounds: &OutlierBounds) -> Self {
        FlowNodePredicate {
            flow_node_id: bounds.flow_node_id.clone(),
            duration: DurationPredicate::Outside {
                lower: bounds.lower_bound_value,
                upper: bounds.upper_bound_value,
            },
        }
    }

    /// The complement of [`FlowNodePredicate::outliers`].
    pub fn non_outliers(bounds: &OutlierBounds) -> Self {
        FlowNodePredicate {
            flow_node_id: bounds.flow_node_id.clone(),
            duration: DurationPredicate::Within {
                lower: bounds.lower_bound_value,
                upper: bounds.upper_bound_value,
            },
        }
    }
}

/// Exact variable name/value match on a process instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMatch {
    pub name: String,
    pub value: String,
}

/// Process instances with a matching flow-node execution and, optionally,
/// a matching variable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePredicate {
    pub flow_node: FlowNodePredicate,
    pub variable: Option<VariableMatch>,
}

/// Which flow-node types take part in the findings map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowNodeTypeFilter {
    Exclude(BTreeSet<String>),
    Only(BTreeSet<String>),
}

impl FlowNodeTypeFilter {
    pub fn accepts(&self, flow_node_type: &str) -> bool {
        match self {
            FlowNodeTypeFilter::Exclude(types) => !types.contains(flow_node_type),
            FlowNodeTypeFilter::Only(types) => types.contains(flow_node_type),
        }
    }
}

/// One histogram bucket as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub bucket_start: i64,
    pub count: u64,
}

/// Executions at or beyond each bound of a flow node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedCounts {
    /// Executions with duration `<= lower`; 0 when there is no lower bound.
    pub lower_count: u64,
    /// Executions with duration `>= upper`; 0 when there is no upper bound.
    pub upper_count: u64,
}

/// Parameters of a term sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TermSampleRequest {
    pub variable_names: Vec<String>,
    /// Most frequent terms kept per variable.
    pub sample_size: usize,
    /// Terms occurring fewer times are dropped.
    pub min_occurrences: u64,
    /// When set, only these terms are counted, and only for these variables.
    pub restrict_to: Option<BTreeMap<String, BTreeSet<String>>>,
}

/// Term frequencies over the process instances matching a predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermSample {
    /// Distinct process instances matching the predicate.
    pub population_count: u64,
    /// variable name -> term -> occurrences.
    pub terms: BTreeMap<String, BTreeMap<String, u64>>,
}

impl TermSample {
    pub fn term_count(&self, variable_name: &str, term: &str) -> u64 {
        self.terms
            .get(variable_name)
            .and_then(|t| t.get(term))
            .copied()
            .unwrap_or(0)
    }

    /// The sampled term set, used to restrict the complementary sample.
    pub fn term_set(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.terms
            .iter()
            .map(|(name, terms)| (name.clone(), terms.keys().cloned().collect()))
            .collect()
    }
}

/// Opaque continuation token of an instance-id listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(pub String);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancePage {
    pub ids: Vec<ProcessInstanceId>,
    pub next_cursor: Option<PageCursor>,
}

/// Aggregate primitives the analysis engine consumes.
///
/// Implementations report an unknown process definition as
/// [`GatewayError::IndexNotFound`]; the engine turns that into an empty
/// result. Retry policy, if any, belongs to the implementation.
pub trait AggregateStoreGateway: Send + Sync {
    /// count/min/max/mean/population std-deviation of one flow node's durations.
    fn distribution_stats(
        &self,
        scope: &ProcessScope,
        flow_node_id: &FlowNodeId,
    ) -> GatewayResult<FlowNodeDurationStats>;

    /// Buckets keyed `floor(duration / interval) * interval`, ascending.
    fn histogram(
        &self,
        scope: &ProcessScope,
        flow_node_id: &FlowNodeId,
        interval: u64,
    ) -> GatewayResult<Vec<HistogramBucket>>;

    fn bounded_counts(
        &self,
        scope: &ProcessScope,
        bounds: &OutlierBounds,
    ) -> GatewayResult<BoundedCounts>;

    fn sample_terms(
        &self,
        scope: &ProcessScope,
        predicate: &FlowNodePredicate,
        request: &TermSampleRequest,
    ) -> GatewayResult<TermSample>;

    /// Up to `limit` ids after `cursor`, in a stable order.
    fn page_instance_ids(
        &self,
        scope: &ProcessScope,
        predicate: &InstancePredicate,
        cursor: Option<&PageCursor>,
        limit: usize,
    ) -> GatewayResult<InstancePage>;

    /// Duration statistics of every flow node accepted by `filter`, at most `limit`.
    fn flow_node_stats(
        &self,
        scope: &ProcessScope,
        filter: &FlowNodeTypeFilter,
        limit: usize,
    ) -> GatewayResult<Vec<FlowNodeDurationStats>>;

    /// Names of the variables recorded in the scope, at most `limit`.
    fn variable_names(&self, scope: &ProcessScope, limit: usize) -> GatewayResult<Vec<String>>;
}
