//! Graph queries shared by the fusion callbacks.

use kiln_ir::error::{InconsistentGraphSnafu, Result};
use kiln_ir::{Graph, NodeId, Op, OpKey, RewriteOutcome, Value};
use snafu::OptionExt;

/// Log why a structural match is not fused and leave the graph alone.
pub(crate) fn decline(rule: &'static str, reason: impl std::fmt::Display) -> Result<RewriteOutcome> {
    tracing::debug!(rule, %reason, "declined");
    Ok(RewriteOutcome::Declined)
}

/// The input edge of `consumer` that reads from `producer`.
///
/// Labels bind nodes; this recovers the exact output a consumer reads,
/// whatever operand position a commutative match put it in.
pub(crate) fn operand(graph: &Graph, consumer: NodeId, producer: NodeId, rule: &'static str) -> Result<Value> {
    graph.node(consumer)?.inputs().iter().copied().find(|value| value.node == producer).context(InconsistentGraphSnafu {
        rule,
        reason: format!("{consumer} does not read from {producer}"),
    })
}

/// `Broadcast(Constant)`: how an initial recurrent state is usually spelled.
pub(crate) fn is_broadcast_constant(graph: &Graph, id: NodeId) -> bool {
    let Some(node) = graph.get(id) else { return false };
    matches!(node.op(), Op::Broadcast { .. })
        && node.inputs().first().and_then(|input| graph.get(input.node)).is_some_and(|p| p.op().key() == OpKey::Constant)
}

/// For `Slice(GetOutputElement(producer))`, the multi-output producer.
pub(crate) fn producer_behind_slice(graph: &Graph, id: NodeId) -> Option<NodeId> {
    let slice = graph.get(id)?;
    if !matches!(slice.op(), Op::Slice { .. }) {
        return None;
    }
    let element = graph.get(slice.inputs().first()?.node)?;
    if !matches!(element.op(), Op::GetOutputElement { .. }) {
        return None;
    }
    Some(element.inputs().first()?.node)
}

/// `GetOutputElement` nodes reading output `index` of `producer`.
pub(crate) fn output_elements(graph: &Graph, producer: NodeId, index: usize) -> Result<Vec<NodeId>> {
    let users = graph.users(Value::new(producer, index))?;
    Ok(users
        .iter()
        .map(|usage| usage.consumer)
        .filter(|&consumer| graph.get(consumer).is_some_and(|node| matches!(node.op(), Op::GetOutputElement { .. })))
        .collect())
}

/// Whether every consumer of every output of `producer` is a `GetOutputElement`.
pub(crate) fn only_read_through_elements(graph: &Graph, producer: NodeId) -> Result<bool> {
    let node = graph.node(producer)?;
    Ok(node.outputs().iter().flat_map(|output| output.users()).all(|usage| {
        graph.get(usage.consumer).is_some_and(|consumer| matches!(consumer.op(), Op::GetOutputElement { .. }))
    }))
}

/// Concatenate along `axis`, or pass a lone value through.
pub(crate) fn concat_or_single(graph: &mut Graph, values: Vec<Value>, axis: usize) -> Result<Value> {
    match values.as_slice() {
        [single] => Ok(*single),
        _ => graph.concat(values, axis),
    }
}
