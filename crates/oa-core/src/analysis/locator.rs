//! Outlier instance enumeration.

use oa_common::{OutlierVariableParameters, ProcessInstanceId, ProcessScope};

use crate::gateway::{
    AggregateStoreGateway, FlowNodePredicate, GatewayResult, InstancePredicate, VariableMatch,
};

/// Predicate selecting outlier executions of the flow node on instances
/// carrying the given variable value.
pub fn outlier_instance_predicate(params: &OutlierVariableParameters) -> InstancePredicate {
    InstancePredicate {
        flow_node: FlowNodePredicate::outliers(&params.outlier.bounds()),
        variable: Some(VariableMatch {
            name: params.variable_name.clone(),
            value: params.variable_term.clone(),
        }),
    }
}

/// Page size used against the gateway.
pub fn page_size(export_limit: usize, max_page_size: usize) -> usize {
    export_limit.min(max_page_size)
}

/// Page through matching ids until `export_limit` are collected or the
/// gateway runs out. `on_page` sees the size of every page fetched.
pub fn collect_instance_ids<G, F>(
    gateway: &G,
    scope: &ProcessScope,
    predicate: &InstancePredicate,
    export_limit: usize,
    max_page_size: usize,
    mut on_page: F,
) -> GatewayResult<Vec<ProcessInstanceId>>
where
    G: AggregateStoreGateway + ?Sized,
    F: FnMut(usize),
{
    let page = page_size(export_limit, max_page_size);
    let mut ids = Vec::new();
    if page == 0 {
        return Ok(ids);
    }

    let mut cursor = None;
    while ids.len() < export_limit {
        let limit = page.min(export_limit - ids.len());
        let result = gateway.page_instance_ids(scope, predicate, cursor.as_ref(), limit)?;
        on_page(result.ids.len());
        if result.ids.is_empty() {
            break;
        }
        ids.extend(result.ids);
        match result.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    ids.truncate(export_limit);
    Ok(ids)
}
