use test_case::test_case;

use kiln_dtype::DType;

use crate::error::Error;
use crate::graph::{Graph, NodeId, Value};
use crate::pattern::{Pat, Predicate, RecurrentMatcher};
use crate::shape::Shape;
use crate::types::OpClass;

/// `h_t = tanh(x_t . W + h_{t-1})` unrolled `steps` times; `swap_at` (counted
/// from the latest step) uses a different weight.
struct Chain {
    graph: Graph,
    inputs: Vec<Value>,
    hidden: Vec<Value>,
    weight: Value,
}

fn chain(steps: usize, swap_at: Option<usize>) -> Chain {
    let mut graph = Graph::new();
    let weight = Value::from(graph.add_parameter(DType::Float32, Shape::from_slice(&[3, 4])).unwrap());
    let other = Value::from(graph.add_parameter(DType::Float32, Shape::from_slice(&[3, 4])).unwrap());
    let h0 = Value::from(graph.add_parameter(DType::Float32, Shape::from_slice(&[2, 4])).unwrap());

    let (mut inputs, mut hidden) = (Vec::new(), vec![h0]);
    for t in 0..steps {
        let x = Value::from(graph.add_parameter(DType::Float32, Shape::from_slice(&[2, 3])).unwrap());
        let w = if swap_at == Some(steps - 1 - t) { other } else { weight };
        let projected = graph.dot(x, w).unwrap();
        let sum = graph.add(projected, hidden[t]).unwrap();
        hidden.push(graph.tanh(sum).unwrap());
        inputs.push(x);
    }
    graph.add_result(hidden[steps]).unwrap();
    Chain { graph, inputs, hidden, weight }
}

fn motif() -> RecurrentMatcher {
    let w = Pat::label_if("w", Predicate::Class(OpClass::Parameter));
    let pat = Pat::tanh(Pat::add(Pat::dot(Pat::label("x"), w), Pat::label("h")));
    RecurrentMatcher::new(pat, "h", ["w"]).unwrap()
}

fn latest(chain: &Chain) -> NodeId {
    chain.hidden.last().unwrap().node
}

#[test_case(1; "single")]
#[test_case(2; "pair")]
#[test_case(5; "five")]
fn test_homogeneous_chain_matches_every_step(steps: usize) {
    let chain = chain(steps, None);
    let found = motif().match_root(&chain.graph, latest(&chain)).unwrap();
    assert_eq!(found.len(), steps);
    assert_eq!(found.bound_nodes("w"), vec![chain.weight.node; steps]);
}

#[test]
fn test_bindings_are_newest_first() {
    let chain = chain(3, None);
    let found = motif().match_root(&chain.graph, latest(&chain)).unwrap();

    let expected: Vec<NodeId> = chain.inputs.iter().rev().map(|x| x.node).collect();
    assert_eq!(found.bound_nodes("x"), expected);

    let states: Vec<NodeId> = chain.hidden[..3].iter().rev().map(|h| h.node).collect();
    assert_eq!(found.require("h").unwrap(), states);
}

#[test_case(1; "second_latest")]
#[test_case(3; "fourth_latest")]
fn test_weight_change_stops_chain(at: usize) {
    let chain = chain(5, Some(at));
    let found = motif().match_root(&chain.graph, latest(&chain)).unwrap();
    assert_eq!(found.len(), at);
    assert!(found.bound_nodes("w").iter().all(|&w| w == chain.weight.node));
}

#[test]
fn test_latest_step_mismatch_fails_outright() {
    let chain = chain(3, None);
    // The latest step alone defines the correlated bindings, so a chain whose
    // root itself does not match yields nothing.
    let root = chain.inputs[0].node;
    assert!(motif().match_root(&chain.graph, root).is_none());
}

#[test]
fn test_iteration_bound() {
    let chain = chain(6, None);
    let found = motif().with_max_iterations(2).match_root(&chain.graph, latest(&chain)).unwrap();
    assert_eq!(found.len(), 2);
    let found = motif().match_root_within(&chain.graph, latest(&chain), 4).unwrap();
    assert_eq!(found.len(), 4);
}

#[test]
fn test_iteration_views() {
    let chain = chain(3, None);
    let found = motif().match_root(&chain.graph, latest(&chain)).unwrap();

    let first = found.iteration(0).unwrap();
    assert_eq!(first.root(), latest(&chain));
    let second = found.iteration(1).unwrap();
    assert_eq!(second.root(), chain.hidden[2].node);
    assert_eq!(second.get("x"), Some(chain.inputs[1].node));
    assert!(found.iteration(3).is_none());
}

#[test]
fn test_unknown_labels_rejected() {
    let pat = Pat::tanh(Pat::label("h"));
    let err = RecurrentMatcher::new(pat.clone(), "state", []).unwrap_err();
    assert_eq!(err, Error::UnboundLabel { label: "state".into() });
    assert!(RecurrentMatcher::new(pat, "h", ["w"]).is_err());

    let chain = chain(2, None);
    let found = motif().match_root(&chain.graph, latest(&chain)).unwrap();
    assert!(found.require("missing").is_err());
    assert!(found.bound_nodes("missing").is_empty());
}
