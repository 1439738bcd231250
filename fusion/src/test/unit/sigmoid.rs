use kiln_ir::prelude::*;
use test_case::test_case;

use crate::FusionConfig;
use crate::test::graphs::{Spelling, count, param, sigmoid};

fn sigmoid_only() -> FusionConfig {
    FusionConfig::builder().lstm_cell(false).rnn(false).multi_layer_rnn(false).build()
}

#[test_case(&[4]; "vector")]
#[test_case(&[2, 3]; "matrix")]
#[test_case(&[2, 3, 5]; "rank 3")]
fn test_fuses_logistic(shape: &[usize]) {
    let mut graph = Graph::new();
    let x = param(&mut graph, shape);
    let y = sigmoid(&mut graph, x, Spelling { explicit_sigmoid: true, ..Default::default() });
    let result = graph.add_result(y).unwrap();

    let stats = crate::fuse(&mut graph, &sigmoid_only()).unwrap();
    assert_eq!(stats.replacements("lstm_fusion"), 1);

    let fused = graph.input(result, 0).unwrap();
    assert_eq!(graph.op(fused.node).unwrap(), &Op::Unary(UnaryOp::Sigmoid));
    assert_eq!(graph.input(fused.node, 0).unwrap(), x);
    assert_eq!(count(&graph, OpKey::Binary(BinaryOp::Divide)), 0);
    assert_eq!(count(&graph, OpKey::Unary(UnaryOp::Exp)), 0);
}

#[test]
fn test_fuses_with_constant_first() {
    let mut graph = Graph::new();
    let x = param(&mut graph, &[3]);
    let one = graph.add_constant(ConstValue::Float(1.0), DType::Float32, Shape::new()).unwrap();
    let one = graph.broadcast(one, &[3], &[0]).unwrap();
    let negative = graph.negative(x).unwrap();
    let exp = graph.exp(negative).unwrap();
    let denominator = graph.add(one, exp).unwrap();
    let y = graph.divide(one, denominator).unwrap();
    graph.add_result(y).unwrap();

    crate::fuse(&mut graph, &sigmoid_only()).unwrap();
    assert_eq!(count(&graph, OpKey::Unary(UnaryOp::Sigmoid)), 1);
}

#[test]
fn test_declines_other_constants() {
    let mut graph = Graph::new();
    let x = param(&mut graph, &[3]);
    let two = graph.add_constant(ConstValue::Float(2.0), DType::Float32, Shape::new()).unwrap();
    let two = graph.broadcast(two, &[3], &[0]).unwrap();
    let negative = graph.negative(x).unwrap();
    let exp = graph.exp(negative).unwrap();
    let denominator = graph.add(exp, two).unwrap();
    let y = graph.divide(two, denominator).unwrap();
    graph.add_result(y).unwrap();
    let before = graph.ordered_nodes();

    let mut sink = CollectingSink::new();
    let stats = crate::fuse_with(&mut graph, &sigmoid_only(), &mut sink).unwrap();
    assert!(stats.is_unchanged());
    assert_eq!(sink.declined().count(), 1);
    assert_eq!(graph.ordered_nodes(), before);
}

#[test]
fn test_disabled_leaves_graph() {
    let mut graph = Graph::new();
    let x = param(&mut graph, &[3]);
    let y = sigmoid(&mut graph, x, Spelling { explicit_sigmoid: true, ..Default::default() });
    graph.add_result(y).unwrap();

    let stats = crate::fuse(&mut graph, &FusionConfig::disabled()).unwrap();
    assert!(stats.passes.is_empty());
    assert_eq!(count(&graph, OpKey::Binary(BinaryOp::Divide)), 1);
}
