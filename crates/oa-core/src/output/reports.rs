//! Report payloads of the CLI commands and their human renderings.

use oa_common::{
    AnalysisConfig, ConfigSnapshot, DurationChartEntry, FlowNodeDurationStats, FlowNodeFinding,
    FlowNodeId, OutlierBounds, OutlierDetail, ProcessInstanceId, VariableTerm,
};
use serde::Serialize;

use super::{markdown_table, Render};
use crate::analysis::FindingsMap;

fn opt_ms(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.0} ms", v))
}

fn pct(v: f64) -> String {
    format!("{:.1}%", v * 100.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartReport {
    pub flow_node_id: FlowNodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_outlier_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub higher_outlier_bound: Option<f64>,
    pub entries: Vec<DurationChartEntry>,
}

impl Render for ChartReport {
    fn markdown(&self) -> String {
        let mut out = format!("# Duration chart: {}\n\n", self.flow_node_id);
        out.push_str(&format!(
            "Bounds: lower {}, higher {}\n\n",
            opt_ms(self.lower_outlier_bound),
            opt_ms(self.higher_outlier_bound)
        ));
        if self.entries.is_empty() {
            out.push_str("No executions recorded.\n");
            return out;
        }
        let rows: Vec<Vec<String>> = self
            .entries
            .iter()
            .map(|e| {
                vec![
                    e.duration_bucket_start.to_string(),
                    e.count.to_string(),
                    if e.is_outlier { "yes" } else { "" }.to_string(),
                ]
            })
            .collect();
        out.push_str(&markdown_table(&["Bucket start (ms)", "Count", "Outlier"], &rows));
        out
    }

    fn summary(&self) -> String {
        let total: u64 = self.entries.iter().map(|e| e.count).sum();
        let outliers: u64 = self
            .entries
            .iter()
            .filter(|e| e.is_outlier)
            .map(|e| e.count)
            .sum();
        format!(
            "chart {}: {} buckets, {} executions, {} in outlier buckets",
            self.flow_node_id,
            self.entries.len(),
            total,
            outliers
        )
    }

    fn has_results(&self) -> bool {
        self.entries.iter().any(|e| e.is_outlier && e.count > 0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FindingsReport {
    pub process_definition_key: String,
    pub only_human_tasks: bool,
    pub findings: FindingsMap,
}

impl FindingsReport {
    /// Findings by heat, hottest first.
    pub fn ranked(&self) -> Vec<&FlowNodeFinding> {
        let mut ranked: Vec<&FlowNodeFinding> = self.findings.values().collect();
        ranked.sort_by(|a, b| {
            b.heat
                .total_cmp(&a.heat)
                .then_with(|| a.flow_node_id.cmp(&b.flow_node_id))
        });
        ranked
    }
}

fn side_cell(detail: Option<&OutlierDetail>) -> String {
    match detail {
        Some(d) => format!(
            "{} (bound {} ms, {}, severity {:.2})",
            d.count,
            d.bound_value,
            pct(d.ratio_within_flow_node),
            d.severity
        ),
        None => "-".to_string(),
    }
}

impl Render for FindingsReport {
    fn markdown(&self) -> String {
        let mut out = format!(
            "# Flow node outliers: {}\n\n",
            self.process_definition_key
        );
        if self.findings.is_empty() {
            out.push_str("No flow node has outliers.\n");
            return out;
        }
        let rows: Vec<Vec<String>> = self
            .ranked()
            .into_iter()
            .map(|f| {
                vec![
                    f.flow_node_id.to_string(),
                    f.total_count.to_string(),
                    side_cell(f.lower_outlier.as_ref()),
                    side_cell(f.higher_outlier.as_ref()),
                    format!("{:.3}", f.heat),
                ]
            })
            .collect();
        out.push_str(&markdown_table(
            &["Flow node", "Executions", "Lower outliers", "Higher outliers", "Heat"],
            &rows,
        ));
        out
    }

    fn summary(&self) -> String {
        match self.ranked().first() {
            Some(top) => format!(
                "findings {}: {} flow nodes with outliers, hottest {} (heat {:.3})",
                self.process_definition_key,
                self.findings.len(),
                top.flow_node_id,
                top.heat
            ),
            None => format!(
                "findings {}: no flow node has outliers",
                self.process_definition_key
            ),
        }
    }

    fn has_results(&self) -> bool {
        !self.findings.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TermsReport {
    pub flow_node_id: FlowNodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_outlier_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub higher_outlier_bound: Option<f64>,
    pub significance_level: f64,
    pub terms: Vec<VariableTerm>,
}

impl Render for TermsReport {
    fn markdown(&self) -> String {
        let mut out = format!("# Significant variable terms: {}\n\n", self.flow_node_id);
        out.push_str(&format!(
            "Bounds: lower {}, higher {}; significance level {}\n\n",
            opt_ms(self.lower_outlier_bound),
            opt_ms(self.higher_outlier_bound),
            self.significance_level
        ));
        if self.terms.is_empty() {
            out.push_str("No variable value is significantly over-represented.\n");
            return out;
        }
        let rows: Vec<Vec<String>> = self
            .terms
            .iter()
            .map(|t| {
                vec![
                    t.variable_name.clone(),
                    t.term.clone(),
                    t.outlier_instance_count.to_string(),
                    pct(t.ratio_in_outlier_set),
                    pct(t.ratio_in_non_outlier_set),
                    pct(t.ratio_of_total_instances),
                ]
            })
            .collect();
        out.push_str(&markdown_table(
            &[
                "Variable",
                "Term",
                "Outlier instances",
                "In outliers",
                "In non-outliers",
                "Of total",
            ],
            &rows,
        ));
        out
    }

    fn summary(&self) -> String {
        match self.terms.first() {
            Some(t) => format!(
                "terms {}: {} significant, top {}={} ({} outlier instances)",
                self.flow_node_id,
                self.terms.len(),
                t.variable_name,
                t.term,
                t.outlier_instance_count
            ),
            None => format!("terms {}: none significant", self.flow_node_id),
        }
    }

    fn has_results(&self) -> bool {
        !self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstancesReport {
    pub flow_node_id: FlowNodeId,
    pub variable_name: String,
    pub variable_term: String,
    pub export_limit: usize,
    pub instance_ids: Vec<ProcessInstanceId>,
}

impl Render for InstancesReport {
    fn markdown(&self) -> String {
        let mut out = format!(
            "# Outlier instances: {} with {}={}\n\n",
            self.flow_node_id, self.variable_name, self.variable_term
        );
        if self.instance_ids.is_empty() {
            out.push_str("No matching instances.\n");
        }
        for id in &self.instance_ids {
            out.push_str(&format!("- {}\n", id));
        }
        out
    }

    fn summary(&self) -> String {
        format!(
            "instances {} {}={}: {} ids (limit {})",
            self.flow_node_id,
            self.variable_name,
            self.variable_term,
            self.instance_ids.len(),
            self.export_limit
        )
    }

    fn has_results(&self) -> bool {
        !self.instance_ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundsReport {
    pub stats: FlowNodeDurationStats,
    pub std_dev_multiplier: f64,
    pub minimum_deviation_from_avg: f64,
    pub bounds: OutlierBounds,
}

impl Render for BoundsReport {
    fn markdown(&self) -> String {
        let s = &self.stats;
        let mut out = format!("# Outlier bounds: {}\n\n", s.flow_node_id);
        out.push_str(&markdown_table(
            &["count", "min", "max", "mean", "std deviation"],
            &[vec![
                s.count.to_string(),
                format!("{:.1}", s.min),
                format!("{:.1}", s.max),
                format!("{:.1}", s.mean),
                format!("{:.1}", s.std_deviation),
            ]],
        ));
        out.push_str(&format!(
            "\nk = {}, minimum deviation = {} ms\n\nLower bound: {}\nUpper bound: {}\n",
            self.std_dev_multiplier,
            self.minimum_deviation_from_avg,
            opt_ms(self.bounds.lower_bound_value),
            opt_ms(self.bounds.upper_bound_value)
        ));
        out
    }

    fn summary(&self) -> String {
        format!(
            "bounds {}: lower {}, upper {}",
            self.stats.flow_node_id,
            opt_ms(self.bounds.lower_bound_value),
            opt_ms(self.bounds.upper_bound_value)
        )
    }

    fn has_results(&self) -> bool {
        self.bounds.has_any()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalReport {
    pub min: f64,
    pub max: f64,
    pub target_bucket_count: i64,
    pub interval: u64,
    pub bucket_count: u64,
}

impl Render for IntervalReport {
    fn markdown(&self) -> String {
        format!(
            "# Histogram interval\n\nRange [{}, {}] with target {} buckets: interval {} ({} buckets)\n",
            self.min, self.max, self.target_bucket_count, self.interval, self.bucket_count
        )
    }

    fn summary(&self) -> String {
        format!("interval {} ({} buckets)", self.interval, self.bucket_count)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigReport {
    pub status: &'static str,
    pub source: ConfigSnapshot,
    pub config: AnalysisConfig,
}

impl Render for ConfigReport {
    fn markdown(&self) -> String {
        let src = &self.source.source;
        let mut out = String::from("# oa-core config\n\n");
        match &src.path {
            Some(path) => {
                out.push_str(&format!("Source: {} ({})\n", path, src.resolution));
                out.push_str(&format!("Hash: {}\n", src.hash.as_deref().unwrap_or("n/a")));
            }
            None => out.push_str("Source: **built-in defaults**\n"),
        }
        out.push_str(&format!("Schema version: {}\n\n", self.source.schema_version));
        let c = &self.config;
        let rows = vec![
            vec!["std_dev_multiplier".into(), c.std_dev_multiplier.to_string()],
            vec![
                "minimum_deviation_from_avg".into(),
                c.minimum_deviation_from_avg.to_string(),
            ],
            vec!["target_bucket_count".into(), c.target_bucket_count.to_string()],
            vec!["significance_level".into(), c.significance_level.to_string()],
            vec!["sample_size".into(), c.sample_size.to_string()],
            vec!["min_term_occurrences".into(), c.min_term_occurrences.to_string()],
            vec![
                "aggregation_bucket_limit".into(),
                c.aggregation_bucket_limit.to_string(),
            ],
            vec!["export_limit".into(), c.export_limit.to_string()],
            vec!["max_page_size".into(), c.max_page_size.to_string()],
        ];
        out.push_str(&markdown_table(&["Setting", "Value"], &rows));
        out
    }

    fn summary(&self) -> String {
        let src = self
            .source
            .source
            .path
            .clone()
            .unwrap_or_else(|| "built-in defaults".to_string());
        format!("config {}: {}", self.status, src)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionReport {
    pub oa_core_version: &'static str,
    pub rust_version: &'static str,
    pub schema_version: &'static str,
}

impl Render for VersionReport {
    fn markdown(&self) -> String {
        format!(
            "oa-core {}\nschema version: {}\n",
            self.oa_core_version, self.schema_version
        )
    }

    fn summary(&self) -> String {
        format!("oa-core {}", self.oa_core_version)
    }
}
