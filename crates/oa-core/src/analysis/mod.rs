//! Flow-node duration outlier analysis.
//!
//! The pure building blocks live in the submodules:
//! - [`interval`]: histogram bucket width
//! - [`bounds`]: outlier thresholds from duration statistics
//! - [`heat`]: heat normalization over a findings map
//! - [`significance`]: two-sample term significance filter
//! - [`locator`]: outlier instance paging
//!
//! [`OutlierAnalyzer`] composes them with an [`AggregateStoreGateway`]. An
//! unknown process definition yields an empty result from every operation.

pub mod bounds;
pub mod chart;
pub mod findings;
pub mod heat;
pub mod interval;
pub mod locator;
pub mod significance;

pub use bounds::compute_bounds;
pub use heat::{aggregate_heat, FindingsMap};
pub use interval::select_interval;
pub use significance::{significant_terms, TermCounts};

use std::collections::BTreeSet;

use oa_common::{
    AnalysisConfig, DurationChartEntry, Error, FlowNodeDurationStats, FlowNodeId, OutlierBounds,
    OutlierParameters, OutlierVariableParameters, ProcessInstanceId, ProcessScope, Result,
    VariableTerm,
};
use tracing::debug_span;

use crate::gateway::{
    AggregateStoreGateway, FlowNodePredicate, FlowNodeTypeFilter, GatewayError, GatewayResult,
    TermSampleRequest,
};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Options of the flow-node outlier map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindingsOptions {
    /// Restrict the map to human task flow nodes.
    pub only_human_tasks: bool,
}

/// Duration statistics of a flow node with the bounds derived from them.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FlowNodeBounds {
    pub stats: FlowNodeDurationStats,
    pub bounds: OutlierBounds,
}

/// Outlier analysis over one aggregate store.
pub struct OutlierAnalyzer<'a, G: ?Sized> {
    gateway: &'a G,
    config: &'a AnalysisConfig,
    ctx: LogContext,
}

impl<'a, G> OutlierAnalyzer<'a, G>
where
    G: AggregateStoreGateway + ?Sized,
{
    pub fn new(gateway: &'a G, config: &'a AnalysisConfig, ctx: LogContext) -> Self {
        OutlierAnalyzer {
            gateway,
            config,
            ctx,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        self.config
    }

    /// Histogram of one flow node's durations with outlier buckets flagged
    /// against the bounds in `params`.
    pub fn duration_chart(&self, params: &OutlierParameters) -> Result<Vec<DurationChartEntry>> {
        let _span = debug_span!("chart", stage = %Stage::Chart, flow_node_id = %params.flow_node_id)
            .entered();
        let scope = &params.process_scope;

        let Some(stats) = self.or_empty(
            self.gateway.distribution_stats(scope, &params.flow_node_id),
            Stage::Chart,
        )?
        else {
            return Ok(Vec::new());
        };
        let interval = chart::chart_interval(&stats, self.config.target_bucket_count)?;
        let Some(buckets) = self.or_empty(
            self.gateway.histogram(scope, &params.flow_node_id, interval),
            Stage::Chart,
        )?
        else {
            return Ok(Vec::new());
        };

        let entries = chart::mark_outlier_buckets(
            &buckets,
            params.lower_outlier_bound,
            params.higher_outlier_bound,
        );
        log_event!(
            self.ctx,
            INFO,
            event_names::CHART_COMPUTED,
            Stage::Chart,
            "duration chart computed",
            flow_node_id = params.flow_node_id.as_str(),
            interval = interval,
            buckets = entries.len() as u64,
            outlier_buckets = entries.iter().filter(|e| e.is_outlier).count() as u64
        );
        Ok(entries)
    }

    /// Stats and derived bounds of one flow node. `None` when the process
    /// definition has no data.
    pub fn flow_node_bounds(
        &self,
        scope: &ProcessScope,
        flow_node_id: &FlowNodeId,
    ) -> Result<Option<FlowNodeBounds>> {
        let Some(stats) = self.or_empty(
            self.gateway.distribution_stats(scope, flow_node_id),
            Stage::Findings,
        )?
        else {
            return Ok(None);
        };
        let bounds = self.bounds_of(&stats);
        Ok(Some(FlowNodeBounds { stats, bounds }))
    }

    fn bounds_of(&self, stats: &FlowNodeDurationStats) -> OutlierBounds {
        let bounds = compute_bounds(
            stats,
            self.config.std_dev_multiplier,
            self.config.minimum_deviation_from_avg,
        );
        log_event!(
            self.ctx,
            DEBUG,
            event_names::BOUNDS_COMPUTED,
            Stage::Findings,
            "outlier bounds computed",
            flow_node_id = stats.flow_node_id.as_str(),
            count = stats.count,
            lower = tracing::field::debug(bounds.lower_bound_value),
            upper = tracing::field::debug(bounds.upper_bound_value)
        );
        bounds
    }

    /// Outlier findings with heat for every flow node of the scope that has
    /// at least one outlier.
    pub fn flow_node_outlier_map(
        &self,
        scope: &ProcessScope,
        options: FindingsOptions,
    ) -> Result<FindingsMap> {
        let _span = debug_span!("findings", stage = %Stage::Findings).entered();
        let filter = self.type_filter(options);

        let Some(all_stats) = self.or_empty(
            self.gateway
                .flow_node_stats(scope, &filter, self.config.aggregation_bucket_limit),
            Stage::Findings,
        )?
        else {
            return Ok(FindingsMap::new());
        };

        let mut raw = FindingsMap::new();
        for stats in &all_stats {
            let bounds = self.bounds_of(stats);
            if !bounds.has_any() {
                continue;
            }
            let Some(counts) =
                self.or_empty(self.gateway.bounded_counts(scope, &bounds), Stage::Findings)?
            else {
                return Ok(FindingsMap::new());
            };
            if counts.lower_count + counts.upper_count > stats.count {
                return Err(Error::Analysis(format!(
                    "flow node '{}' has {} bounded executions but only {} in total",
                    stats.flow_node_id,
                    counts.lower_count + counts.upper_count,
                    stats.count
                )));
            }
            let finding = findings::build_finding(stats, &bounds, counts);
            raw.insert(stats.flow_node_id.clone(), finding);
        }

        let map = aggregate_heat(raw);
        log_event!(
            self.ctx,
            INFO,
            event_names::FINDINGS_COMPUTED,
            Stage::Findings,
            "flow node outlier map computed",
            flow_nodes = all_stats.len() as u64,
            with_outliers = map.len() as u64
        );
        Ok(map)
    }

    fn type_filter(&self, options: FindingsOptions) -> FlowNodeTypeFilter {
        if options.only_human_tasks {
            FlowNodeTypeFilter::Only(self.config.human_task_types.iter().cloned().collect())
        } else {
            FlowNodeTypeFilter::Exclude(
                self.config
                    .excluded_flow_node_types
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<_>>(),
            )
        }
    }

    /// Variable values significantly over-represented among the outliers of
    /// one flow node. At least one bound is required.
    pub fn significant_variable_terms(
        &self,
        params: &OutlierParameters,
    ) -> Result<Vec<VariableTerm>> {
        params.require_bounds()?;
        let _span = debug_span!("terms", stage = %Stage::Terms, flow_node_id = %params.flow_node_id)
            .entered();
        let scope = &params.process_scope;
        let bounds = params.bounds();

        let Some(variable_names) = self.or_empty(
            self.gateway
                .variable_names(scope, self.config.aggregation_bucket_limit),
            Stage::Terms,
        )?
        else {
            return Ok(Vec::new());
        };

        let outlier_request = TermSampleRequest {
            variable_names,
            sample_size: self.config.sample_size,
            min_occurrences: self.config.min_term_occurrences,
            restrict_to: None,
        };
        let Some(outliers) = self.or_empty(
            self.gateway.sample_terms(
                scope,
                &FlowNodePredicate::outliers(&bounds),
                &outlier_request,
            ),
            Stage::Terms,
        )?
        else {
            return Ok(Vec::new());
        };
        log_event!(
            self.ctx,
            DEBUG,
            event_names::TERMS_SAMPLED,
            Stage::Terms,
            "outlier terms sampled",
            population = outliers.population_count,
            variables = outliers.terms.len() as u64
        );
        if outliers.population_count == 0 || outliers.terms.is_empty() {
            return Ok(Vec::new());
        }

        // The complementary pass only looks at terms found among outliers.
        let non_outlier_request = TermSampleRequest {
            variable_names: outliers.terms.keys().cloned().collect(),
            sample_size: self.config.sample_size,
            min_occurrences: 1,
            restrict_to: Some(outliers.term_set()),
        };
        let Some(non_outliers) = self.or_empty(
            self.gateway.sample_terms(
                scope,
                &FlowNodePredicate::non_outliers(&bounds),
                &non_outlier_request,
            ),
            Stage::Terms,
        )?
        else {
            return Ok(Vec::new());
        };
        log_event!(
            self.ctx,
            DEBUG,
            event_names::TERMS_SAMPLED,
            Stage::Terms,
            "non-outlier terms sampled",
            population = non_outliers.population_count,
            variables = non_outliers.terms.len() as u64
        );

        let terms = significant_terms(&outliers, &non_outliers, self.config.significance_level);
        log_event!(
            self.ctx,
            INFO,
            event_names::TERMS_COMPUTED,
            Stage::Terms,
            "significant variable terms computed",
            flow_node_id = params.flow_node_id.as_str(),
            outlier_count = outliers.population_count,
            non_outlier_count = non_outliers.population_count,
            significant = terms.len() as u64
        );
        Ok(terms)
    }

    /// Ids of the process instances whose execution of the flow node is an
    /// outlier and that carry the given variable value, up to the export limit.
    pub fn outlier_instance_ids(
        &self,
        params: &OutlierVariableParameters,
    ) -> Result<Vec<ProcessInstanceId>> {
        params.outlier.require_bounds()?;
        let _span = debug_span!(
            "instances",
            stage = %Stage::Instances,
            flow_node_id = %params.outlier.flow_node_id
        )
        .entered();

        let predicate = locator::outlier_instance_predicate(params);
        let collected = locator::collect_instance_ids(
            self.gateway,
            &params.outlier.process_scope,
            &predicate,
            self.config.export_limit,
            self.config.max_page_size,
            |n| {
                log_event!(
                    self.ctx,
                    DEBUG,
                    event_names::INSTANCES_PAGE,
                    Stage::Instances,
                    "instance page fetched",
                    ids = n as u64
                )
            },
        );
        let Some(ids) = self.or_empty(collected, Stage::Instances)? else {
            return Ok(Vec::new());
        };
        log_event!(
            self.ctx,
            INFO,
            event_names::INSTANCES_LISTED,
            Stage::Instances,
            "outlier instance ids listed",
            variable_name = params.variable_name.as_str(),
            ids = ids.len() as u64
        );
        Ok(ids)
    }

    /// `Ok(None)` for a missing index, logged at info; other gateway errors
    /// are logged and returned.
    fn or_empty<T>(&self, result: GatewayResult<T>, stage: Stage) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(GatewayError::IndexNotFound {
                process_definition_key,
            }) => {
                log_event!(
                    self.ctx,
                    INFO,
                    event_names::GATEWAY_INDEX_MISSING,
                    stage,
                    "no data for process definition; returning empty result",
                    missing_key = process_definition_key.as_str()
                );
                Ok(None)
            }
            Err(err) => {
                log_event!(
                    self.ctx,
                    WARN,
                    event_names::GATEWAY_ERROR,
                    stage,
                    "aggregate store query failed",
                    error = tracing::field::display(&err)
                );
                Err(err.into())
            }
        }
    }
}
