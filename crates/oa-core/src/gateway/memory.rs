//! In-memory aggregate store over a JSON dataset of process instances.
//!
//! Aggregation semantics follow a document store with nested flow-node and
//! variable collections: statistics are computed over flow-node executions,
//! term counts over process instances (one hit per instance, however many of
//! its executions match), and histogram buckets are keyed
//! `floor(duration / interval) * interval` with empty interior buckets kept.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use oa_common::{
    Error, FlowNodeDurationStats, FlowNodeId, OutlierBounds, ProcessInstanceId, ProcessScope,
    Result,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::{
    AggregateStoreGateway, BoundedCounts, FlowNodePredicate, FlowNodeTypeFilter, GatewayError,
    GatewayResult, HistogramBucket, InstancePage, InstancePredicate, PageCursor, TermSample,
    TermSampleRequest,
};

/// Page-size cap applied when none is configured.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 10_000;

/// One executed flow node of a process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNodeInstanceRecord {
    pub flow_node_id: FlowNodeId,
    #[serde(default)]
    pub flow_node_type: String,
    /// Absent while the flow node is still running.
    #[serde(default)]
    pub total_duration_in_ms: Option<f64>,
}

/// A process variable. Non-string values are compared by their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl VariableRecord {
    /// The term this variable contributes to a term aggregation; `None` for null.
    pub fn term(&self) -> Option<String> {
        match &self.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// One recorded process execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstanceRecord {
    pub process_instance_id: ProcessInstanceId,
    pub process_definition_key: String,
    #[serde(deserialize_with = "version_string")]
    pub process_definition_version: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub flow_node_instances: Vec<FlowNodeInstanceRecord>,
    #[serde(default)]
    pub variables: Vec<VariableRecord>,
}

impl ProcessInstanceRecord {
    fn durations_of<'a>(&'a self, flow_node_id: &'a FlowNodeId) -> impl Iterator<Item = f64> + 'a {
        self.flow_node_instances
            .iter()
            .filter(move |f| &f.flow_node_id == flow_node_id)
            .filter_map(|f| f.total_duration_in_ms)
    }

    fn has_execution(&self, predicate: &FlowNodePredicate) -> bool {
        self.durations_of(&predicate.flow_node_id)
            .any(|d| predicate.duration.matches(d))
    }

    fn has_variable(&self, name: &str, value: &str) -> bool {
        self.variables
            .iter()
            .any(|v| v.name == name && v.term().as_deref() == Some(value))
    }
}

/// Versions are deployed as integers but exported as either numbers or strings.
fn version_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "processDefinitionVersion must be a string or number, got {}",
            other
        ))),
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// A dataset of process instances as exported from the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    pub instances: Vec<ProcessInstanceRecord>,
}

impl Dataset {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(json)?;
        dataset.check()?;
        Ok(dataset)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let dataset = Self::from_json_str(&content)?;
        debug!(
            path = %path.display(),
            instances = dataset.instances.len(),
            "dataset parsed"
        );
        Ok(dataset)
    }

    fn check(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for instance in &self.instances {
            if !seen.insert(&instance.process_instance_id) {
                return Err(Error::Dataset(format!(
                    "duplicate processInstanceId '{}'",
                    instance.process_instance_id
                )));
            }
            for node in &instance.flow_node_instances {
                if let Some(d) = node.total_duration_in_ms {
                    if !d.is_finite() {
                        return Err(Error::Dataset(format!(
                            "non-finite duration on flow node '{}' of instance '{}'",
                            node.flow_node_id, instance.process_instance_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Reference [`AggregateStoreGateway`] backed by a [`Dataset`].
#[derive(Debug, Clone)]
pub struct InMemoryGateway {
    dataset: Dataset,
    max_page_size: usize,
}

impl InMemoryGateway {
    pub fn new(dataset: Dataset) -> Self {
        InMemoryGateway {
            dataset,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::new(Dataset::from_json_str(json)?))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(Dataset::from_path(path)?))
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn instance_count(&self) -> usize {
        self.dataset.instances.len()
    }

    /// Instances within `scope`, or `IndexNotFound` when the definition has none at all.
    fn scoped(&self, scope: &ProcessScope) -> GatewayResult<Vec<&ProcessInstanceRecord>> {
        let of_definition: Vec<&ProcessInstanceRecord> = self
            .dataset
            .instances
            .iter()
            .filter(|i| i.process_definition_key == scope.process_definition_key)
            .collect();
        if of_definition.is_empty() {
            return Err(GatewayError::IndexNotFound {
                process_definition_key: scope.process_definition_key.clone(),
            });
        }

        let versions: Option<BTreeSet<String>> = if scope.includes_all_versions() {
            None
        } else {
            let mut wanted: BTreeSet<String> = scope
                .definition_versions
                .iter()
                .filter(|v| !v.eq_ignore_ascii_case(oa_common::model::LATEST_VERSION))
                .cloned()
                .collect();
            if scope.includes_latest_version() {
                if let Some(latest) = of_definition
                    .iter()
                    .map(|i| i.process_definition_version.as_str())
                    .max_by(|a, b| compare_versions(a, b))
                {
                    wanted.insert(latest.to_string());
                }
            }
            Some(wanted)
        };

        Ok(of_definition
            .into_iter()
            .filter(|i| {
                versions
                    .as_ref()
                    .map_or(true, |v| v.contains(&i.process_definition_version))
            })
            .filter(|i| scope.includes_tenant(i.tenant_id.as_deref()))
            .collect())
    }

    fn durations(
        &self,
        scope: &ProcessScope,
        flow_node_id: &FlowNodeId,
    ) -> GatewayResult<Vec<f64>> {
        Ok(self
            .scoped(scope)?
            .into_iter()
            .flat_map(|i| i.durations_of(flow_node_id).collect::<Vec<_>>())
            .collect())
    }
}

impl AggregateStoreGateway for InMemoryGateway {
    fn distribution_stats(
        &self,
        scope: &ProcessScope,
        flow_node_id: &FlowNodeId,
    ) -> GatewayResult<FlowNodeDurationStats> {
        let durations = self.durations(scope, flow_node_id)?;
        Ok(FlowNodeDurationStats::from_durations(
            flow_node_id.clone(),
            &durations,
        ))
    }

    fn histogram(
        &self,
        scope: &ProcessScope,
        flow_node_id: &FlowNodeId,
        interval: u64,
    ) -> GatewayResult<Vec<HistogramBucket>> {
        if interval == 0 {
            return Err(GatewayError::InvalidQuery(
                "histogram interval must be positive".to_string(),
            ));
        }
        let width = interval as f64;
        let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();
        for d in self.durations(scope, flow_node_id)? {
            let key = ((d / width).floor() * width) as i64;
            *buckets.entry(key).or_insert(0) += 1;
        }

        let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back())
        else {
            return Ok(Vec::new());
        };
        let step = i64::try_from(interval)
            .map_err(|_| GatewayError::InvalidQuery(format!("interval {} too large", interval)))?;
        let mut out = Vec::new();
        let mut key = first;
        while key <= last {
            out.push(HistogramBucket {
                bucket_start: key,
                count: buckets.get(&key).copied().unwrap_or(0),
            });
            key += step;
        }
        Ok(out)
    }

    fn bounded_counts(
        &self,
        scope: &ProcessScope,
        bounds: &OutlierBounds,
    ) -> GatewayResult<BoundedCounts> {
        let durations = self.durations(scope, &bounds.flow_node_id)?;
        Ok(BoundedCounts {
            lower_count: bounds.lower_bound_value.map_or(0, |lower| {
                durations.iter().filter(|d| **d <= lower).count() as u64
            }),
            upper_count: bounds.upper_bound_value.map_or(0, |upper| {
                durations.iter().filter(|d| **d >= upper).count() as u64
            }),
        })
    }

    fn sample_terms(
        &self,
        scope: &ProcessScope,
        predicate: &FlowNodePredicate,
        request: &TermSampleRequest,
    ) -> GatewayResult<TermSample> {
        let matching: Vec<&ProcessInstanceRecord> = self
            .scoped(scope)?
            .into_iter()
            .filter(|i| i.has_execution(predicate))
            .collect();

        let wanted: BTreeSet<&str> = match &request.restrict_to {
            Some(restrict) => restrict.keys().map(String::as_str).collect(),
            None => request.variable_names.iter().map(String::as_str).collect(),
        };

        let mut counts: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        for instance in &matching {
            let mut seen: BTreeSet<(&str, String)> = BTreeSet::new();
            for variable in &instance.variables {
                if !wanted.contains(variable.name.as_str()) {
                    continue;
                }
                let Some(term) = variable.term() else {
                    continue;
                };
                if let Some(restrict) = &request.restrict_to {
                    if !restrict
                        .get(&variable.name)
                        .is_some_and(|terms| terms.contains(&term))
                    {
                        continue;
                    }
                }
                seen.insert((variable.name.as_str(), term));
            }
            for (name, term) in seen {
                *counts
                    .entry(name.to_string())
                    .or_default()
                    .entry(term)
                    .or_insert(0) += 1;
            }
        }

        let mut terms = BTreeMap::new();
        for (name, by_term) in counts {
            let mut ranked: Vec<(String, u64)> = by_term
                .into_iter()
                .filter(|(_, count)| *count >= request.min_occurrences)
                .collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            ranked.truncate(request.sample_size);
            if !ranked.is_empty() {
                terms.insert(name, ranked.into_iter().collect());
            }
        }

        Ok(TermSample {
            population_count: matching.len() as u64,
            terms,
        })
    }

    fn page_instance_ids(
        &self,
        scope: &ProcessScope,
        predicate: &InstancePredicate,
        cursor: Option<&PageCursor>,
        limit: usize,
    ) -> GatewayResult<InstancePage> {
        let limit = limit.min(self.max_page_size);
        if limit == 0 {
            return Err(GatewayError::InvalidQuery(
                "page size must be positive".to_string(),
            ));
        }

        let mut ids: Vec<&ProcessInstanceId> = self
            .scoped(scope)?
            .into_iter()
            .filter(|i| i.has_execution(&predicate.flow_node))
            .filter(|i| {
                predicate
                    .variable
                    .as_ref()
                    .map_or(true, |v| i.has_variable(&v.name, &v.value))
            })
            .map(|i| &i.process_instance_id)
            .filter(|id| cursor.map_or(true, |c| id.as_str() > c.0.as_str()))
            .collect();
        ids.sort();

        let has_more = ids.len() > limit;
        ids.truncate(limit);
        let next_cursor = if has_more {
            ids.last().map(|id| PageCursor(id.as_str().to_string()))
        } else {
            None
        };
        Ok(InstancePage {
            ids: ids.into_iter().cloned().collect(),
            next_cursor,
        })
    }

    fn flow_node_stats(
        &self,
        scope: &ProcessScope,
        filter: &FlowNodeTypeFilter,
        limit: usize,
    ) -> GatewayResult<Vec<FlowNodeDurationStats>> {
        let mut by_node: BTreeMap<&FlowNodeId, Vec<f64>> = BTreeMap::new();
        for instance in self.scoped(scope)? {
            for node in &instance.flow_node_instances {
                if !filter.accepts(&node.flow_node_type) {
                    continue;
                }
                if let Some(d) = node.total_duration_in_ms {
                    by_node.entry(&node.flow_node_id).or_default().push(d);
                }
            }
        }

        let mut stats: Vec<FlowNodeDurationStats> = by_node
            .into_iter()
            .map(|(id, durations)| FlowNodeDurationStats::from_durations(id.clone(), &durations))
            .collect();
        stats.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.flow_node_id.cmp(&b.flow_node_id))
        });
        stats.truncate(limit);
        Ok(stats)
    }

    fn variable_names(&self, scope: &ProcessScope, limit: usize) -> GatewayResult<Vec<String>> {
        let names: BTreeSet<&str> = self
            .scoped(scope)?
            .into_iter()
            .flat_map(|i| i.variables.iter().map(|v| v.name.as_str()))
            .collect();
        Ok(names.into_iter().take(limit).map(String::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{DurationPredicate, VariableMatch};
    use serde_json::json;

    fn instance(id: &str, version: u32, task_ms: f64, country: &str) -> serde_json::Value {
        json!({
            "processInstanceId": id,
            "processDefinitionKey": "invoice",
            "processDefinitionVersion": version,
            "flowNodeInstances": [
                {"flowNodeId": "start", "flowNodeType": "startEvent", "totalDurationInMs": 0},
                {"flowNodeId": "approve", "flowNodeType": "userTask", "totalDurationInMs": task_ms},
                {"flowNodeId": "split", "flowNodeType": "exclusiveGateway", "totalDurationInMs": 1}
            ],
            "variables": [{"name": "country", "value": country}, {"name": "amount", "value": 10}]
        })
    }

    fn gateway() -> InMemoryGateway {
        let data = json!([
            instance("pi-1", 1, 100.0, "US"),
            instance("pi-2", 1, 200.0, "US"),
            instance("pi-3", 2, 300.0, "DE"),
            instance("pi-4", 2, 1000.0, "US"),
            instance("pi-5", 2, 1050.0, "US"),
        ]);
        InMemoryGateway::from_json_str(&data.to_string()).unwrap()
    }

    fn approve() -> FlowNodeId {
        FlowNodeId::new("approve")
    }

    #[test]
    fn unknown_definition_reports_missing_index() {
        let gw = gateway();
        let err = gw
            .distribution_stats(&ProcessScope::new("shipping"), &approve())
            .unwrap_err();
        assert!(matches!(err, GatewayError::IndexNotFound { .. }));
    }

    #[test]
    fn unknown_flow_node_has_empty_stats() {
        let gw = gateway();
        let stats = gw
            .distribution_stats(&ProcessScope::new("invoice"), &FlowNodeId::new("nope"))
            .unwrap();
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn latest_version_resolves_to_highest() {
        let gw = gateway();
        let scope = ProcessScope::new("invoice").with_versions(["latest"]);
        let stats = gw.distribution_stats(&scope, &approve()).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 300.0);

        let v1 = ProcessScope::new("invoice").with_versions(["1"]);
        assert_eq!(gw.distribution_stats(&v1, &approve()).unwrap().count, 2);
    }

    #[test]
    fn numeric_versions_compare_numerically() {
        assert_eq!(compare_versions("10", "9"), Ordering::Greater);
        assert_eq!(compare_versions("b", "a"), Ordering::Greater);
    }

    #[test]
    fn tenant_filter_applies() {
        let data = json!([
            {"processInstanceId": "a", "processDefinitionKey": "k", "processDefinitionVersion": "1",
             "tenantId": "acme", "flowNodeInstances": [{"flowNodeId": "t", "totalDurationInMs": 5}]},
            {"processInstanceId": "b", "processDefinitionKey": "k", "processDefinitionVersion": "1",
             "flowNodeInstances": [{"flowNodeId": "t", "totalDurationInMs": 7}]}
        ]);
        let gw = InMemoryGateway::from_json_str(&data.to_string()).unwrap();
        let scope = ProcessScope::new("k").with_tenants(["acme"]);
        let stats = gw.distribution_stats(&scope, &FlowNodeId::new("t")).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean, 5.0);
    }

    #[test]
    fn histogram_fills_interior_gaps() {
        let gw = gateway();
        let buckets = gw
            .histogram(&ProcessScope::new("invoice"), &approve(), 250)
            .unwrap();
        let keys: Vec<i64> = buckets.iter().map(|b| b.bucket_start).collect();
        assert_eq!(keys, vec![0, 250, 500, 750, 1000]);
        let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 0, 0, 2]);
    }

    #[test]
    fn histogram_rejects_zero_interval() {
        let gw = gateway();
        let err = gw
            .histogram(&ProcessScope::new("invoice"), &approve(), 0)
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidQuery(_)));
    }

    #[test]
    fn bounded_counts_are_inclusive() {
        let gw = gateway();
        let bounds = OutlierBounds {
            flow_node_id: approve(),
            lower_bound_value: Some(200.0),
            upper_bound_value: Some(1000.0),
        };
        let counts = gw
            .bounded_counts(&ProcessScope::new("invoice"), &bounds)
            .unwrap();
        assert_eq!(counts.lower_count, 2);
        assert_eq!(counts.upper_count, 2);

        let upper_only = OutlierBounds {
            lower_bound_value: None,
            ..bounds
        };
        let counts = gw
            .bounded_counts(&ProcessScope::new("invoice"), &upper_only)
            .unwrap();
        assert_eq!(counts.lower_count, 0);
    }

    #[test]
    fn term_sample_counts_instances_and_applies_cutoff() {
        let gw = gateway();
        let predicate = FlowNodePredicate {
            flow_node_id: approve(),
            duration: DurationPredicate::Within {
                lower: None,
                upper: None,
            },
        };
        let request = TermSampleRequest {
            variable_names: vec!["country".into(), "amount".into()],
            sample_size: 10,
            min_occurrences: 2,
            restrict_to: None,
        };
        let sample = gw
            .sample_terms(&ProcessScope::new("invoice"), &predicate, &request)
            .unwrap();
        assert_eq!(sample.population_count, 5);
        assert_eq!(sample.term_count("country", "US"), 4);
        assert_eq!(sample.term_count("country", "DE"), 0);
        assert_eq!(sample.term_count("amount", "10"), 5);
    }

    #[test]
    fn term_sample_honours_restriction() {
        let gw = gateway();
        let predicate = FlowNodePredicate {
            flow_node_id: approve(),
            duration: DurationPredicate::Within {
                lower: None,
                upper: Some(500.0),
            },
        };
        let mut restrict = BTreeMap::new();
        restrict.insert("country".to_string(), BTreeSet::from(["DE".to_string()]));
        let request = TermSampleRequest {
            variable_names: vec!["country".into(), "amount".into()],
            sample_size: 10,
            min_occurrences: 1,
            restrict_to: Some(restrict),
        };
        let sample = gw
            .sample_terms(&ProcessScope::new("invoice"), &predicate, &request)
            .unwrap();
        assert_eq!(sample.population_count, 3);
        assert_eq!(sample.term_count("country", "DE"), 1);
        assert_eq!(sample.term_count("country", "US"), 0);
        assert!(!sample.terms.contains_key("amount"));
    }

    #[test]
    fn paging_walks_all_matches_in_id_order() {
        let gw = gateway().with_max_page_size(2);
        let predicate = InstancePredicate {
            flow_node: FlowNodePredicate {
                flow_node_id: approve(),
                duration: DurationPredicate::Outside {
                    lower: Some(150.0),
                    upper: Some(900.0),
                },
            },
            variable: Some(VariableMatch {
                name: "country".into(),
                value: "US".into(),
            }),
        };
        let scope = ProcessScope::new("invoice");
        let first = gw.page_instance_ids(&scope, &predicate, None, 50).unwrap();
        assert_eq!(
            first.ids,
            vec![ProcessInstanceId::new("pi-1"), ProcessInstanceId::new("pi-4")]
        );
        let second = gw
            .page_instance_ids(&scope, &predicate, first.next_cursor.as_ref(), 50)
            .unwrap();
        assert_eq!(second.ids, vec![ProcessInstanceId::new("pi-5")]);
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn flow_node_stats_respects_type_filter() {
        let gw = gateway();
        let filter = FlowNodeTypeFilter::Exclude(["exclusiveGateway".to_string()].into());
        let stats = gw
            .flow_node_stats(&ProcessScope::new("invoice"), &filter, 100)
            .unwrap();
        let ids: Vec<&str> = stats.iter().map(|s| s.flow_node_id.as_str()).collect();
        assert_eq!(ids, vec!["approve", "start"]);

        let only = FlowNodeTypeFilter::Only(["userTask".to_string()].into());
        let stats = gw
            .flow_node_stats(&ProcessScope::new("invoice"), &only, 100)
            .unwrap();
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn variable_names_are_distinct_and_sorted() {
        let gw = gateway();
        let names = gw
            .variable_names(&ProcessScope::new("invoice"), 10)
            .unwrap();
        assert_eq!(names, vec!["amount".to_string(), "country".to_string()]);
    }

    #[test]
    fn duplicate_instance_ids_are_rejected() {
        let data = json!([instance("pi-1", 1, 1.0, "US"), instance("pi-1", 1, 2.0, "US")]);
        let err = Dataset::from_json_str(&data.to_string()).unwrap_err();
        assert_eq!(err.code(), 62);
    }
}
