//! Duration chart assembly.

use oa_common::{DurationChartEntry, FlowNodeDurationStats, Result};

use super::interval::select_interval;
use crate::gateway::HistogramBucket;

/// Histogram interval for a flow node's chart; 1 for an empty population.
pub fn chart_interval(stats: &FlowNodeDurationStats, target_bucket_count: i64) -> Result<u64> {
    if stats.count == 0 {
        // Still validate the target so a bad request fails the same way on empty data.
        select_interval(0.0, 0.0, target_bucket_count)?;
        return Ok(1);
    }
    select_interval(stats.min, stats.max, target_bucket_count)
}

/// Chart entries in ascending bucket order, flagging buckets whose start key
/// lies at or beyond either bound.
pub fn mark_outlier_buckets(
    buckets: &[HistogramBucket],
    lower: Option<f64>,
    higher: Option<f64>,
) -> Vec<DurationChartEntry> {
    let mut entries: Vec<DurationChartEntry> = buckets
        .iter()
        .map(|b| {
            let key = b.bucket_start as f64;
            DurationChartEntry {
                duration_bucket_start: b.bucket_start,
                count: b.count,
                is_outlier: lower.is_some_and(|l| key <= l) || higher.is_some_and(|h| key >= h),
            }
        })
        .collect();
    entries.sort_by_key(|e| e.duration_bucket_start);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use oa_common::FlowNodeId;

    fn buckets(keys: &[i64]) -> Vec<HistogramBucket> {
        keys.iter()
            .map(|&k| HistogramBucket {
                bucket_start: k,
                count: 1,
            })
            .collect()
    }

    #[test]
    fn marks_both_tails_inclusively() {
        let entries = mark_outlier_buckets(&buckets(&[0, 100, 200, 300, 400]), Some(100.0), Some(300.0));
        let flags: Vec<bool> = entries.iter().map(|e| e.is_outlier).collect();
        assert_eq!(flags, vec![true, true, false, true, true]);
    }

    #[test]
    fn no_bounds_no_outliers() {
        let entries = mark_outlier_buckets(&buckets(&[0, 100]), None, None);
        assert!(entries.iter().all(|e| !e.is_outlier));
    }

    #[test]
    fn entries_are_sorted() {
        let entries = mark_outlier_buckets(&buckets(&[200, 0, 100]), None, Some(150.0));
        let keys: Vec<i64> = entries.iter().map(|e| e.duration_bucket_start).collect();
        assert_eq!(keys, vec![0, 100, 200]);
        assert!(entries[2].is_outlier);
    }

    #[test]
    fn empty_population_interval_is_one() {
        let stats = FlowNodeDurationStats::empty(FlowNodeId::new("t"));
        assert_eq!(chart_interval(&stats, 80).unwrap(), 1);
        assert!(chart_interval(&stats, 0).is_err());
    }

    #[test]
    fn interval_from_stats() {
        let stats = FlowNodeDurationStats {
            flow_node_id: FlowNodeId::new("t"),
            count: 10,
            min: 0.0,
            max: 100_000.0,
            mean: 500.0,
            std_deviation: 10.0,
        };
        assert_eq!(chart_interval(&stats, 80).unwrap(), 1250);
    }
}
