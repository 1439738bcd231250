//! One unrolled LSTM cell to an `Lstm` node.
//!
//! The cell is recognised in its textbook form:
//!
//! ```text
//! X   = (h_{t-1} · W_hᵀ + b_h) + (x_t · W_xᵀ + b_x)
//! f   = σ(X[:, 0H..1H])      i = σ(X[:, 1H..2H])
//! g   = tanh(X[:, 2H..3H])   o = σ(X[:, 3H..4H])
//! c_t = f ⊙ c_{t-1} + i ⊙ g
//! h_t = o ⊙ tanh(c_t)
//! ```
//!
//! Weights must be parameters stored gate-major (`[4H, features]`); biases
//! may hide behind a broadcast or reshape. Because the two projections are
//! summed, the matcher cannot tell the input from the hidden state; the
//! callback sorts them out before building the fused cell.

use kiln_ir::ops::recurrent::LSTM_GATES;
use kiln_ir::prelude::*;

use crate::helpers::{decline, is_broadcast_constant, operand, producer_behind_slice};

const RULE: &str = "lstm_cell";

/// Gate slices in column order of `X`.
const GATES: [&str; LSTM_GATES] = ["forget_gate", "input_gate", "candidate_gate", "output_gate"];

fn weight(name: &str) -> Pat {
    Pat::label_if(name, Predicate::Class(OpClass::Parameter))
}

fn projection(input: &str, weights: &str, bias: &str, dot: &str) -> Pat {
    Pat::add(
        Pat::capture(dot, Pat::dot(Pat::label(input), Pat::reshape(weight(weights)))),
        Pat::skip(weight(bias), Predicate::layout_only()),
    )
}

/// `X`; every gate slice repeats the full template so the first one visited binds it.
fn gates() -> Pat {
    Pat::capture("gates", Pat::add(projection("h", "w_h", "b_h", "dot_h"), projection("x", "w_x", "b_x", "dot_x")))
}

fn gate(name: &str) -> Pat {
    Pat::capture(name, Pat::slice(gates()))
}

pub fn pattern() -> Pat {
    let cell_state = Pat::add(
        Pat::capture("forget", Pat::multiply(Pat::sigmoid(gate(GATES[0])), Pat::label("ct_1"))),
        Pat::multiply(Pat::sigmoid(gate(GATES[1])), Pat::tanh(gate(GATES[2]))),
    );
    Pat::multiply(Pat::sigmoid(gate(GATES[3])), Pat::tanh(Pat::capture("ct", cell_state)))
}

/// Which projection reads the input and which the hidden state.
#[derive(Debug, Clone, Copy)]
struct Operands {
    src_layer: Value,
    hidden: Value,
    weights_layer: NodeId,
    weights_iter: NodeId,
}

impl Operands {
    fn swapped(self) -> Self {
        Self {
            src_layer: self.hidden,
            hidden: self.src_layer,
            weights_layer: self.weights_iter,
            weights_iter: self.weights_layer,
        }
    }
}

/// Put the hidden state where it belongs.
///
/// The hidden operand is the one that is a broadcast constant initial state,
/// that shares a fused producer with `c_{t-1}`, or that was computed from
/// `c_{t-1}`. Failing those, it is the one shaped like `c_{t-1}`.
fn orient(graph: &Graph, operands: Operands, ct_1: Value) -> Result<Operands> {
    let (src, hidden) = (operands.src_layer.node, operands.hidden.node);
    if is_broadcast_constant(graph, src) && !is_broadcast_constant(graph, hidden) {
        return Ok(operands.swapped());
    }
    if graph.shape(operands.hidden)? != graph.shape(ct_1)? {
        return Ok(operands.swapped());
    }
    if let Some(cell) = producer_behind_slice(graph, ct_1.node) {
        let shares = |id| producer_behind_slice(graph, id) == Some(cell);
        if shares(src) && !shares(hidden) {
            return Ok(operands.swapped());
        }
        return Ok(operands);
    }
    if graph.depends_on(src, ct_1.node) && !graph.depends_on(hidden, ct_1.node) {
        return Ok(operands.swapped());
    }
    Ok(operands)
}

/// Whether the slice `id` takes gate `index` of width `hidden` over all `batch` rows.
fn is_gate_slice(graph: &Graph, id: NodeId, index: usize, batch: usize, hidden: usize) -> Result<bool> {
    Ok(match graph.op(id)? {
        Op::Slice { lower, upper, strides } => {
            lower[..] == [0, index * hidden]
                && upper[..] == [batch, (index + 1) * hidden]
                && strides.iter().all(|&s| s == 1)
        }
        _ => false,
    })
}

pub fn fuse(graph: &mut Graph, m: &Match) -> Result<RewriteOutcome> {
    let root = m.root();
    let dtype = graph.node(root)?.dtype();
    if !dtype.is_float() {
        return decline(RULE, format_args!("{dtype} is not a float type"));
    }

    let matched = Operands {
        src_layer: operand(graph, m.node("dot_x")?, m.node("x")?, RULE)?,
        hidden: operand(graph, m.node("dot_h")?, m.node("h")?, RULE)?,
        weights_layer: m.node("w_x")?,
        weights_iter: m.node("w_h")?,
    };
    let ct_1 = operand(graph, m.node("forget")?, m.node("ct_1")?, RULE)?;
    let Operands { src_layer, hidden, weights_layer, weights_iter } = orient(graph, matched, ct_1)?;

    for value in [src_layer, hidden, Value::from(weights_layer), Value::from(weights_iter)] {
        let rank = graph.shape(value)?.len();
        if rank != 2 {
            return decline(RULE, format_args!("{value} has rank {rank}, expected 2"));
        }
    }
    let (b_x, b_h) = (m.node("b_x")?, m.node("b_h")?);
    for bias in [b_x, b_h] {
        let rank = graph.shape(bias)?.len();
        if rank != 1 {
            return decline(RULE, format_args!("bias {bias} has rank {rank}, expected 1"));
        }
    }

    let (layer_rows, src_features) = (graph.shape(weights_layer)?[0], graph.shape(weights_layer)?[1]);
    let (iter_rows, iter_features) = (graph.shape(weights_iter)?[0], graph.shape(weights_iter)?[1]);
    if layer_rows % LSTM_GATES != 0 || layer_rows != iter_rows {
        return decline(RULE, format_args!("layer and iteration weights have {layer_rows} and {iter_rows} gate rows"));
    }
    let hidden_size = layer_rows / LSTM_GATES;
    let batch = graph.shape(src_layer)?[0];
    if iter_features != hidden_size
        || graph.shape(hidden)?[..] != [batch, hidden_size]
        || graph.shape(ct_1)?[..] != [batch, hidden_size]
    {
        return decline(RULE, "recurrent state is not shaped [batch, hidden]");
    }
    for (index, name) in GATES.iter().enumerate() {
        if !is_gate_slice(graph, m.node(name)?, index, batch, hidden_size)? {
            return decline(RULE, format_args!("{name} does not cover gate {index}"));
        }
    }

    let gate_width = LSTM_GATES * hidden_size;
    let src_iter = graph.concat([hidden, ct_1], 0)?;
    let bias = graph.add(b_x, b_h)?;
    let layer = graph.reshape(weights_layer, &[1, 0], &[src_features, gate_width])?;
    let iter = graph.reshape(weights_iter, &[1, 0], &[iter_features, gate_width])?;
    let lstm = graph.lstm([src_layer, src_iter, layer, iter, bias])?;

    let ht = graph.get_output_element(Value::new(lstm, 0))?;
    let state = graph.get_output_element(Value::new(lstm, 1))?;
    let ht = graph.slice(ht, &[0, 0], &[batch, hidden_size])?;
    let ct = graph.slice(state, &[batch, 0], &[2 * batch, hidden_size])?;

    graph.replace_node(m.node("ct")?, ct.node)?;
    graph.replace_node(root, ht.node)?;
    tracing::debug!(%root, %lstm, batch, hidden = hidden_size, "fused lstm cell");
    Ok(RewriteOutcome::Replaced)
}
