//! Outlier bound computation from duration statistics.

use oa_common::{FlowNodeDurationStats, OutlierBounds};

/// Lower/upper outlier thresholds of one flow node.
///
/// `k` scales the standard deviation; `minimum_deviation_from_avg` keeps
/// each bound at least that far from the mean. A side is only reported when
/// the floored bound lies strictly inside `(min, max)`, so something in the
/// population can actually cross it. A population without spread has no
/// bounds.
pub fn compute_bounds(
    stats: &FlowNodeDurationStats,
    k: f64,
    minimum_deviation_from_avg: f64,
) -> OutlierBounds {
    let mut bounds = OutlierBounds::none(stats.flow_node_id.clone());
    if stats.count == 0 || stats.std_deviation == 0.0 || !spread_is_usable(stats) {
        return bounds;
    }

    let lower_raw = stats.mean - k * stats.std_deviation;
    let upper_raw = stats.mean + k * stats.std_deviation;
    let lower = lower_raw.min(stats.mean - minimum_deviation_from_avg);
    let upper = upper_raw.max(stats.mean + minimum_deviation_from_avg);

    if lower > stats.min {
        bounds.lower_bound_value = Some(lower);
    }
    if upper < stats.max {
        bounds.upper_bound_value = Some(upper);
    }
    bounds
}

fn spread_is_usable(stats: &FlowNodeDurationStats) -> bool {
    [stats.mean, stats.std_deviation, stats.min, stats.max]
        .iter()
        .all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oa_common::FlowNodeId;

    fn stats(min: f64, max: f64, mean: f64, std_deviation: f64, count: u64) -> FlowNodeDurationStats {
        FlowNodeDurationStats {
            flow_node_id: FlowNodeId::new("task"),
            count,
            min,
            max,
            mean,
            std_deviation,
        }
    }

    #[test]
    fn zero_spread_has_no_bounds() {
        let b = compute_bounds(&stats(100.0, 10_100.0, 1000.0, 0.0, 50), 1.5, 0.0);
        assert_eq!(b.lower_bound_value, None);
        assert_eq!(b.upper_bound_value, None);
    }

    #[test]
    fn lower_side_below_min_is_inactive() {
        let b = compute_bounds(&stats(0.0, 20_000.0, 2000.0, 3000.0, 100), 1.5, 500.0);
        assert_eq!(b.lower_bound_value, None);
        assert_eq!(b.upper_bound_value, Some(6500.0));
    }

    #[test]
    fn both_sides_active() {
        let b = compute_bounds(&stats(100.0, 2000.0, 1000.0, 100.0, 40), 2.0, 0.0);
        assert_eq!(b.lower_bound_value, Some(800.0));
        assert_eq!(b.upper_bound_value, Some(1200.0));
    }

    #[test]
    fn deviation_floor_widens_bounds() {
        let b = compute_bounds(&stats(0.0, 5000.0, 1000.0, 10.0, 40), 1.5, 300.0);
        assert_eq!(b.lower_bound_value, Some(700.0));
        assert_eq!(b.upper_bound_value, Some(1300.0));
    }

    #[test]
    fn floor_can_suppress_a_side() {
        // k*sigma alone would give an upper bound of 1015, inside the range;
        // the floor pushes it to 1600, past max.
        let b = compute_bounds(&stats(900.0, 1500.0, 1000.0, 10.0, 40), 1.5, 600.0);
        assert_eq!(b.upper_bound_value, None);
        assert_eq!(b.lower_bound_value, None);
    }

    #[test]
    fn bound_equal_to_extreme_is_inactive() {
        let b = compute_bounds(&stats(850.0, 1150.0, 1000.0, 100.0, 10), 1.5, 0.0);
        assert_eq!(b.lower_bound_value, None);
        assert_eq!(b.upper_bound_value, None);
    }

    #[test]
    fn empty_population_has_no_bounds() {
        let b = compute_bounds(&FlowNodeDurationStats::empty(FlowNodeId::new("t")), 1.5, 0.0);
        assert!(!b.has_any());
    }

    #[test]
    fn non_finite_stats_have_no_bounds() {
        let b = compute_bounds(&stats(0.0, f64::INFINITY, 10.0, 5.0, 3), 1.5, 0.0);
        assert!(!b.has_any());
    }
}
