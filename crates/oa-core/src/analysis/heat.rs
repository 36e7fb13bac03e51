//! Outlier heat normalization across the flow nodes of one scope.

use std::collections::BTreeMap;

use oa_common::{FlowNodeFinding, FlowNodeId};

/// Findings keyed by flow node, in flow-node id order.
pub type FindingsMap = BTreeMap<FlowNodeId, FlowNodeFinding>;

/// Populate the heat fields of every finding and drop nodes without outliers.
///
/// Side heat is a node's share of all outliers on that side; overall heat is
/// its share of all outliers. Only raw counts are read, so applying this to
/// its own output changes nothing.
pub fn aggregate_heat(findings: FindingsMap) -> FindingsMap {
    let total_lower: u64 = findings.values().map(FlowNodeFinding::lower_count).sum();
    let total_higher: u64 = findings.values().map(FlowNodeFinding::higher_count).sum();
    let total = total_lower + total_higher;

    findings
        .into_iter()
        .filter(|(_, f)| f.outlier_count() > 0)
        .map(|(id, mut f)| {
            f.lower_outlier_heat = f
                .lower_outlier
                .as_ref()
                .map(|o| share(o.count, total_lower));
            f.higher_outlier_heat = f
                .higher_outlier
                .as_ref()
                .map(|o| share(o.count, total_higher));
            f.heat = share(f.outlier_count(), total);
            (id, f)
        })
        .collect()
}

fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
