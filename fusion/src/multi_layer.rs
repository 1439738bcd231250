//! Stacked `Rnn` layers to one multi-layer `Rnn`.
//!
//! Layer `l + 1` reads the hidden sequence of layer `l` as its input, so the
//! recurrent label is the layer input and each iteration descends one layer.
//! The fused node takes the first layer's input and the per-layer state,
//! weights and biases concatenated earliest layer first; its state output
//! stacks `[h_l; c_l]` per layer in the same order.

use itertools::Itertools;
use kiln_ir::prelude::*;

use crate::helpers::{decline, output_elements};

const RULE: &str = "multi_layer_rnn";

pub fn pattern() -> Pat {
    let rnn = Pat::rnn([
        Pat::label("src_layer"),
        Pat::label("src_iter"),
        Pat::label("weights_layer"),
        Pat::label("weights_iter"),
        Pat::label("bias"),
    ]);
    Pat::capture("hidden", Pat::output_element(rnn, 0))
}

pub fn matcher() -> Result<RecurrentMatcher> {
    RecurrentMatcher::new(pattern(), "src_layer", [])
}

fn rnn_attrs(graph: &Graph, rnn: NodeId) -> Result<Option<RnnAttrs>> {
    Ok(match graph.op(rnn)? {
        Op::Rnn(attrs) => Some(attrs.clone()),
        _ => None,
    })
}

pub fn fuse(graph: &mut Graph, m: &RecurrentMatch) -> Result<RewriteOutcome> {
    if m.len() < 2 {
        return decline(RULE, "a single layer");
    }

    // Earliest layer first.
    let hidden_outputs: Vec<NodeId> = m.require("hidden")?.into_iter().rev().collect();
    let layers = hidden_outputs.iter().map(|&hidden| graph.producer(hidden, 0)).collect::<Result<Vec<_>>>()?;

    let mut layer_attrs = Vec::with_capacity(layers.len());
    let mut input_shapes = Vec::with_capacity(layers.len());
    for (&layer, &hidden) in layers.iter().zip(&hidden_outputs) {
        let Some(attrs) = rnn_attrs(graph, layer)? else {
            return decline(RULE, format_args!("{layer} is not an rnn"));
        };
        if attrs.num_fused_layers != 1 || attrs.direction != 1 {
            return decline(RULE, format_args!("{layer} is already stacked or bidirectional"));
        }
        let input = graph.input(layer, 0)?;
        let (input_features, output_features) = (graph.shape(input)?[1], graph.shape(hidden)?[1]);
        if input_features != output_features {
            return decline(
                RULE,
                format_args!("{layer} maps {input_features} input features to {output_features} hidden features"),
            );
        }
        layer_attrs.push(attrs);
        input_shapes.push(graph.shape(input)?.clone());
    }
    let uniform = layer_attrs.iter().map(|a| (a.num_timesteps, a.num_gates_per_cell, a.num_cell_states)).all_equal();
    if !uniform || !input_shapes.iter().all_equal() {
        return decline(RULE, "layers differ in sequence length, gates or batch");
    }

    let inputs_of = |graph: &Graph, slot: usize| -> Result<Vec<Value>> {
        layers.iter().map(|&layer| graph.input(layer, slot)).collect()
    };
    let src_layer = graph.input(layers[0], 0)?;
    let (states, weights_layer, weights_iter, biases) =
        (inputs_of(&*graph, 1)?, inputs_of(&*graph, 2)?, inputs_of(&*graph, 3)?, inputs_of(&*graph, 4)?);
    let state_rows = graph.shape(states[0])?[0];
    let features = layer_attrs[0].src_iter_feature_size;

    let src_iter = graph.concat(states, 0)?;
    let weights_layer = graph.concat(weights_layer, 0)?;
    let weights_iter = graph.concat(weights_iter, 0)?;
    let bias = graph.concat(biases, 0)?;

    let attrs = RnnAttrs { num_fused_layers: layers.len(), ..layer_attrs[0].clone() };
    tracing::debug!(%attrs, "fusing stacked rnn layers");
    let rnn = graph.rnn(attrs, [src_layer, src_iter, weights_layer, weights_iter, bias])?;
    let hidden = graph.get_output_element(Value::new(rnn, 0))?;
    let state = graph.get_output_element(Value::new(rnn, 1))?;

    for (index, &layer) in layers.iter().enumerate() {
        let rows = index * state_rows;
        let layer_state = graph.slice(state, &[rows, 0], &[rows + state_rows, features])?;
        for element in output_elements(graph, layer, 1)? {
            graph.replace_node(element, layer_state.node)?;
        }
    }
    // Intermediate hidden sequences stay inside the fused node.
    if let Some(&last) = layers.last() {
        for element in output_elements(graph, last, 0)? {
            graph.replace_node(element, hidden.node)?;
        }
    }
    Ok(RewriteOutcome::Replaced)
}
