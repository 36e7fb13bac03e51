//! Per-flow-node outlier findings before heat normalization.

use oa_common::{FlowNodeDurationStats, FlowNodeFinding, OutlierBounds, OutlierDetail};

use crate::gateway::BoundedCounts;

/// Raw finding of one flow node from its stats, bounds, and bounded counts.
///
/// A side is reported only when its bound is active and at least one
/// execution reached it. Heat fields stay empty.
pub fn build_finding(
    stats: &FlowNodeDurationStats,
    bounds: &OutlierBounds,
    counts: BoundedCounts,
) -> FlowNodeFinding {
    let mut finding = FlowNodeFinding::new(stats.flow_node_id.clone(), stats.count);

    if let Some(lower) = bounds.lower_bound_value {
        if counts.lower_count > 0 {
            finding.lower_outlier = Some(detail(
                lower,
                counts.lower_count,
                stats.count,
                ratio(stats.mean, lower),
            ));
        }
    }
    if let Some(upper) = bounds.upper_bound_value {
        if counts.upper_count > 0 {
            finding.higher_outlier = Some(detail(
                upper,
                counts.upper_count,
                stats.count,
                ratio(upper, stats.mean),
            ));
        }
    }
    finding
}

fn detail(bound: f64, count: u64, total_count: u64, severity: f64) -> OutlierDetail {
    OutlierDetail {
        bound_value: bound as i64,
        ratio_within_flow_node: if total_count == 0 {
            0.0
        } else {
            count as f64 / total_count as f64
        },
        count,
        severity,
    }
}

/// `numerator / denominator`, or 0 when that is not a finite positive number.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    let r = numerator / denominator;
    if r.is_finite() && r > 0.0 {
        r
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oa_common::FlowNodeId;

    fn stats() -> FlowNodeDurationStats {
        FlowNodeDurationStats {
            flow_node_id: FlowNodeId::new("task"),
            count: 200,
            min: 100.0,
            max: 5000.0,
            mean: 1000.0,
            std_deviation: 300.0,
        }
    }

    fn bounds(lower: Option<f64>, upper: Option<f64>) -> OutlierBounds {
        OutlierBounds {
            flow_node_id: FlowNodeId::new("task"),
            lower_bound_value: lower,
            upper_bound_value: upper,
        }
    }

    #[test]
    fn both_sides() {
        let f = build_finding(
            &stats(),
            &bounds(Some(550.9), Some(1450.0)),
            BoundedCounts {
                lower_count: 10,
                upper_count: 30,
            },
        );
        let lower = f.lower_outlier.unwrap();
        assert_eq!(lower.bound_value, 550);
        assert_eq!(lower.count, 10);
        assert_eq!(lower.ratio_within_flow_node, 0.05);
        assert!((lower.severity - 1000.0 / 550.9).abs() < 1e-12);

        let higher = f.higher_outlier.unwrap();
        assert_eq!(higher.bound_value, 1450);
        assert_eq!(higher.ratio_within_flow_node, 0.15);
        assert_eq!(higher.severity, 1.45);
        assert_eq!(f.total_count, 200);
        assert!(f.lower_outlier_heat.is_none());
    }

    #[test]
    fn side_without_hits_is_omitted() {
        let f = build_finding(
            &stats(),
            &bounds(Some(550.0), Some(1450.0)),
            BoundedCounts {
                lower_count: 0,
                upper_count: 4,
            },
        );
        assert!(f.lower_outlier.is_none());
        assert_eq!(f.higher_count(), 4);
    }

    #[test]
    fn counts_without_bound_are_ignored() {
        let f = build_finding(
            &stats(),
            &bounds(None, None),
            BoundedCounts {
                lower_count: 5,
                upper_count: 5,
            },
        );
        assert_eq!(f.outlier_count(), 0);
    }

    #[test]
    fn non_positive_lower_bound_has_zero_severity() {
        let f = build_finding(
            &stats(),
            &bounds(Some(0.0), None),
            BoundedCounts {
                lower_count: 1,
                upper_count: 0,
            },
        );
        assert_eq!(f.lower_outlier.unwrap().severity, 0.0);
    }
}
