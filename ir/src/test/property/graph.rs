//! Structural invariants of graph construction and replacement.

use proptest::prelude::*;

use kiln_dtype::DType;

use crate::graph::{Graph, Value};
use crate::shape::TensorType;

use super::generators::*;

/// A chain `tanh(exp(...(x)))` of `depth` unary ops over one parameter.
fn unary_chain(graph: &mut Graph, dtype: DType, shape: crate::shape::Shape, depth: usize) -> (Value, Value) {
    let x = Value::from(graph.add_parameter(dtype, shape).unwrap());
    let mut value = x;
    for i in 0..depth {
        value = if i % 2 == 0 { graph.exp(value).unwrap() } else { graph.tanh(value).unwrap() };
    }
    (x, value)
}

proptest! {
    /// Elementwise chains keep the parameter's type end to end.
    #[test]
    fn elementwise_chain_preserves_type(shape in arb_shape(), dtype in arb_float_dtype(), depth in 0usize..8) {
        let mut graph = Graph::new();
        let (_, top) = unary_chain(&mut graph, dtype, shape.clone(), depth);
        prop_assert_eq!(graph.ty(top).unwrap(), &TensorType::new(dtype, shape));
    }

    /// Every input edge is mirrored by exactly one use on its producer.
    #[test]
    fn users_mirror_inputs(shape in arb_shape(), depth in 1usize..8) {
        let mut graph = Graph::new();
        let (x, top) = unary_chain(&mut graph, DType::Float32, shape, depth);
        let doubled = graph.add(top, x).unwrap();
        graph.add_result(doubled).unwrap();

        for node in graph.nodes() {
            for (input, value) in node.inputs().iter().enumerate() {
                let uses = graph.users(*value).unwrap();
                let matching = uses.iter().filter(|u| u.consumer == node.id() && u.input == input).count();
                prop_assert_eq!(matching, 1);
            }
        }
    }

    /// After replacing the top of a chain, no result reaches the old node.
    #[test]
    fn replaced_node_is_unreachable(shape in arb_shape(), depth in 1usize..6) {
        let mut graph = Graph::new();
        let (x, top) = unary_chain(&mut graph, DType::Float32, shape, depth);
        graph.add_result(top).unwrap();

        let replacement = graph.negative(x).unwrap();
        graph.replace_node(top.node, replacement.node).unwrap();

        prop_assert!(!graph.ordered_nodes().contains(&top.node));
        graph.sweep();
        prop_assert!(!graph.contains(top.node));
        prop_assert!(graph.contains(replacement.node));
    }

    /// The topological order lists producers before their consumers.
    #[test]
    fn ordered_nodes_is_topological(shape in arb_ranked_shape(), depth in 1usize..8) {
        let mut graph = Graph::new();
        let (x, top) = unary_chain(&mut graph, DType::Float64, shape, depth);
        let sum = graph.add(top, x).unwrap();
        graph.add_result(sum).unwrap();

        let order = graph.ordered_nodes();
        for (position, id) in order.iter().enumerate() {
            for input in graph.node(*id).unwrap().inputs() {
                let producer = order.iter().position(|other| *other == input.node).unwrap();
                prop_assert!(producer < position);
            }
        }
    }
}
