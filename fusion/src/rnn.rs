//! Chains of fused LSTM cells to one `Rnn` node.
//!
//! Each cell produced by [`crate::lstm`] reads its recurrent state as
//! `Concat(h_{t-1}, c_{t-1})`, where both halves are slices of the previous
//! cell's outputs. The cell-state slice has the same shape as the motif's
//! root, so the recurrent matcher walks the chain backwards from the latest
//! cell, one timestep per iteration. Weights and biases are correlated: the
//! chain stops where a cell uses different ones.

use itertools::Itertools;
use kiln_ir::ops::recurrent::{LSTM_CELL_STATES, LSTM_GATES};
use kiln_ir::prelude::*;

use crate::helpers::{concat_or_single, decline, only_read_through_elements, output_elements};

const RULE: &str = "rnn";
const CONCAT_RULE: &str = "concat_slices";

pub fn pattern() -> Pat {
    let lstm = Pat::lstm([
        Pat::label("src_layer"),
        Pat::concat([Pat::label("ht"), Pat::label("ct")]),
        Pat::reshape(Pat::label_if("w_x", Predicate::Class(OpClass::Parameter))),
        Pat::reshape(Pat::label_if("w_h", Predicate::Class(OpClass::Parameter))),
        Pat::add(Pat::label("b_x"), Pat::label("b_h")),
    ]);
    Pat::slice(Pat::capture("element", Pat::get_output_element(lstm)))
}

pub fn matcher() -> Result<RecurrentMatcher> {
    RecurrentMatcher::new(pattern(), "ct", ["w_x", "w_h", "b_x", "b_h"])
}

pub fn fuse(graph: &mut Graph, m: &RecurrentMatch) -> Result<RewriteOutcome> {
    // Latest cell first.
    let cells =
        m.require("element")?.into_iter().map(|element| graph.producer(element, 0)).collect::<Result<Vec<_>>>()?;
    let steps = cells.len();

    for &cell in &cells {
        if !only_read_through_elements(graph, cell)? {
            return decline(RULE, format_args!("{cell} has consumers other than output elements"));
        }
    }
    let inputs = cells.iter().rev().map(|&cell| graph.input(cell, 0)).collect::<Result<Vec<_>>>()?;
    let input_shapes = inputs.iter().map(|&input| graph.shape(input)).collect::<Result<Vec<_>>>()?;
    if !input_shapes.iter().all_equal() {
        return decline(RULE, "timesteps have differently shaped inputs");
    }

    let Some(&first) = cells.last() else { return decline(RULE, "empty chain") };
    let first_inputs = graph.node(first)?.inputs().to_vec();
    let [_, src_iter, weights_layer, weights_iter, bias] = first_inputs[..] else {
        return decline(RULE, format_args!("{first} is not a five-input cell"));
    };
    let batch = graph.shape(inputs[0])?[0];
    let (src_layer_feature_size, src_iter_feature_size) = (graph.shape(weights_layer)?[0], graph.shape(weights_iter)?[0]);

    let attrs = RnnAttrs {
        num_timesteps: steps,
        num_gates_per_cell: LSTM_GATES,
        src_sequence_length: steps,
        src_layer_feature_size,
        src_iter_feature_size,
        num_cell_states: LSTM_CELL_STATES,
        direction: 1,
        num_fused_layers: 1,
    };
    tracing::debug!(%attrs, batch, "fusing lstm chain");

    let src_layer = concat_or_single(graph, inputs, 0)?;
    let rnn = graph.rnn(attrs, [src_layer, src_iter, weights_layer, weights_iter, bias])?;
    let hidden = graph.get_output_element(Value::new(rnn, 0))?;
    let state = graph.get_output_element(Value::new(rnn, 1))?;

    for (age, &cell) in cells.iter().enumerate() {
        let step = steps - 1 - age;
        let ht = match steps {
            1 => hidden,
            _ => graph.slice(hidden, &[step * batch, 0], &[(step + 1) * batch, src_iter_feature_size])?,
        };
        for element in output_elements(graph, cell, 0)? {
            retarget_hidden(graph, element, ht)?;
        }
    }
    // Only the latest cell's state leaves the sequence.
    for element in output_elements(graph, cells[0], 1)? {
        graph.replace_node(element, state.node)?;
    }
    Ok(RewriteOutcome::Replaced)
}

/// Point the consumers of one cell's hidden output at its timestep of the sequence.
///
/// Whole-tensor slices of the element are replaced outright; other consumers
/// read the timestep slice instead of the element.
fn retarget_hidden(graph: &mut Graph, element: NodeId, step: Value) -> Result<()> {
    let users = graph.users(element)?.to_vec();
    let step_ty = graph.ty(step)?.clone();
    for usage in users {
        let consumer = graph.node(usage.consumer)?;
        if matches!(consumer.op(), Op::Slice { .. }) && consumer.outputs().len() == 1 && *consumer.ty() == step_ty {
            graph.replace_node(usage.consumer, step.node)?;
        } else {
            graph.replace_input(usage.consumer, usage.input, step)?;
        }
    }
    Ok(())
}

/// Any concatenation; the callback decides whether it is made of slices.
pub fn concat_pattern() -> Pat {
    Pat::label_if("concat", Predicate::Key(OpKey::Concat))
}

/// `Concat(Slice(v), Slice(v), ...)` of adjacent unit-stride slices to `v`,
/// or to one slice of `v` when they do not cover it.
pub fn fuse_concat_slices(graph: &mut Graph, m: &Match) -> Result<RewriteOutcome> {
    let root = m.root();
    let node = graph.node(root)?;
    let Op::Concat { axis } = *node.op() else { return decline(CONCAT_RULE, "not a concat") };

    let mut source = None;
    let mut pieces = Vec::with_capacity(node.inputs().len());
    for input in node.inputs() {
        let producer = graph.node(input.node)?;
        let Op::Slice { lower, upper, strides } = producer.op() else {
            return decline(CONCAT_RULE, format_args!("{} is not a slice", input.node));
        };
        if strides.iter().any(|&s| s != 1) {
            return decline(CONCAT_RULE, "strided slice");
        }
        let sliced = producer.inputs()[0];
        if *source.get_or_insert(sliced) != sliced {
            return decline(CONCAT_RULE, "slices of different values");
        }
        pieces.push((lower.clone(), upper.clone()));
    }
    let Some(source) = source else { return decline(CONCAT_RULE, "empty concat") };
    let extent = graph.shape(source)?.clone();

    let adjacent = pieces.iter().tuple_windows().all(|((_, upper), (lower, _))| upper[axis] == lower[axis]);
    let full_width = pieces
        .iter()
        .all(|(lower, upper)| (0..extent.len()).filter(|&i| i != axis).all(|i| lower[i] == 0 && upper[i] == extent[i]));
    if !adjacent || !full_width {
        return decline(CONCAT_RULE, "slices are not adjacent along the concat axis");
    }

    let (Some((lower, _)), Some((_, upper))) = (pieces.first(), pieces.last()) else {
        return decline(CONCAT_RULE, "empty concat");
    };
    if lower[axis] == 0 && upper[axis] == extent[axis] {
        graph.replace_output(Value::new(root, 0), source)?;
    } else {
        let whole = graph.slice(source, lower, upper)?;
        graph.replace_node(root, whole.node)?;
    }
    tracing::debug!(%root, %source, "merged adjacent slices");
    Ok(RewriteOutcome::Replaced)
}
