//! Reverse-mode differentiation over the graph.
//!
//! [`differentiate`] applies one operation's adjoint rule; [`backprop`]
//! drives it over every node between the requested inputs and a root,
//! summing deltas that reach the same output along several paths.

use std::collections::HashMap;

use snafu::ensure;

use crate::error::*;
use crate::graph::{Graph, NodeId, Value};
use crate::types::ConstValue;

pub mod rules;

pub use rules::{InputDeltas, differentiate};

/// Accumulated delta per output.
#[derive(Debug, Default)]
pub struct Adjoints {
    deltas: HashMap<Value, Value>,
}

impl Adjoints {
    pub fn get(&self, value: Value) -> Option<Value> {
        self.deltas.get(&value).copied()
    }

    fn accumulate(&mut self, graph: &mut Graph, value: Value, delta: Value) -> Result<()> {
        let total = match self.deltas.get(&value) {
            Some(&existing) => graph.add(existing, delta)?,
            None => delta,
        };
        self.deltas.insert(value, total);
        Ok(())
    }
}

/// Gradients of `root` with respect to each value in `wrt`.
///
/// `seed` is the delta of `root` and must have its type. Only nodes that lie
/// on a path from some `wrt` value to `root` are differentiated, so
/// operations without an adjoint elsewhere in the graph do not matter.
/// A `wrt` value that does not reach `root` gets a zero gradient.
#[tracing::instrument(skip_all, fields(%root, wrt = wrt.len()))]
pub fn backprop(graph: &mut Graph, root: Value, seed: Value, wrt: &[Value]) -> Result<Vec<Value>> {
    let (root_ty, seed_ty) = (graph.ty(root)?, graph.ty(seed)?);
    ensure!(root_ty == seed_ty, ReplacementTypeMismatchSnafu { old: root_ty.clone(), new: seed_ty.clone() });
    for &value in wrt {
        graph.output(value)?;
    }

    let order = graph.topological_order([root.node]);
    let mut relevant: HashMap<NodeId, bool> = HashMap::with_capacity(order.len());
    for &id in &order {
        let depends = wrt.iter().any(|value| value.node == id)
            || graph.node(id)?.inputs().iter().any(|input| relevant.get(&input.node).copied().unwrap_or(false));
        relevant.insert(id, depends);
    }

    let mut adjoints = Adjoints::default();
    adjoints.deltas.insert(root, seed);

    for &id in order.iter().rev() {
        let node = graph.node(id)?;
        if !relevant[&id] || node.inputs().is_empty() {
            continue;
        }
        let outputs = node.outputs().len();
        let inputs: Vec<Value> = node.inputs().to_vec();
        if (0..outputs).all(|index| adjoints.get(Value::new(id, index)).is_none()) {
            continue;
        }

        let mut deltas = Vec::with_capacity(outputs);
        for index in 0..outputs {
            let value = Value::new(id, index);
            deltas.push(match adjoints.get(value) {
                Some(delta) => delta,
                None => zero_like(graph, value)?,
            });
        }

        tracing::trace!(%id, op = %graph.op(id)?, "differentiating");
        let input_deltas = differentiate(graph, id, &deltas)?;
        for (input, delta) in inputs.into_iter().zip(input_deltas) {
            if relevant.get(&input.node).copied().unwrap_or(false) {
                adjoints.accumulate(graph, input, delta)?;
            }
        }
    }

    wrt.iter()
        .map(|&value| match adjoints.get(value) {
            Some(delta) => Ok(delta),
            None => zero_like(graph, value),
        })
        .collect()
}

fn zero_like(graph: &mut Graph, like: Value) -> Result<Value> {
    let dtype = graph.dtype(like)?;
    graph.constant_like(ConstValue::zero(dtype), like)
}
