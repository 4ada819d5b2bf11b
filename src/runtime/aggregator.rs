/// Input aggregation for a node about to run

use crate::runtime::store::ResultStore;
use crate::workflow::graph::ExecutionGraph;
use crate::workflow::types::{NodeInputBundle, NodeValues, RawValue};
use serde_json::Map;

/// Build the bundle handed to a node's capability
///
/// `input` is the caller's raw value for the node (empty object when absent).
/// `previous_output` holds the recorded output of every predecessor that has
/// one, in order of first encounter while scanning edges. Recomputed on every
/// dispatch; nothing is cached.
pub fn compose(
    slot: usize,
    graph: &ExecutionGraph,
    values: &NodeValues,
    store: &ResultStore,
) -> NodeInputBundle {
    let node = graph.node(slot);

    let input = values.get(&node.id).cloned().unwrap_or_else(RawValue::empty);

    let mut previous_output = Map::new();
    for &pred in graph.predecessors(slot) {
        let pred_id = &graph.node(pred).id;
        if let Some(output) = store.output(pred_id) {
            previous_output.insert(pred_id.clone(), output.clone());
        }
    }

    tracing::debug!(
        "📥 Composed input for '{}': {} predecessor output(s)",
        node.id,
        previous_output.len()
    );

    NodeInputBundle {
        input,
        previous_output,
    }
}
