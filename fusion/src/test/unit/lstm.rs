use kiln_ir::prelude::*;
use kiln_ir::rewrite::Diagnostic;

use crate::FusionConfig;
use crate::test::graphs::*;

fn cells_only() -> FusionConfig {
    FusionConfig::builder().rnn(false).multi_layer_rnn(false).build()
}

/// One cell over parameters, with `h_t` and `c_t` declared as results.
fn single_cell(dims: Dims, spelling: Spelling, initial: Option<(Value, Value)>) -> (Graph, Value) {
    let mut graph = Graph::new();
    let x = param(&mut graph, &[dims.batch, dims.features]);
    let initial = initial.unwrap_or_else(|| {
        (param(&mut graph, &[dims.batch, dims.hidden]), param(&mut graph, &[dims.batch, dims.hidden]))
    });
    let weights = LayerWeights::new(&mut graph, dims);
    let (ht, ct) = lstm_cell(&mut graph, dims, &weights, x, initial, spelling);
    graph.add_result(ht).unwrap();
    graph.add_result(ct).unwrap();
    (graph, x)
}

#[test]
fn test_fuses_single_cell() {
    let (mut graph, x) = single_cell(Dims::new(2, 3, 4), Spelling::default(), None);
    let before = result_types(&graph);

    let stats = crate::fuse(&mut graph, &cells_only()).unwrap();
    assert_eq!(stats.replacements("lstm_fusion"), 1);
    assert_eq!(result_types(&graph), before);

    let cells = find(&graph, OpKey::Lstm);
    assert_eq!(cells.len(), 1);
    assert_eq!(graph.input(cells[0], 0).unwrap(), x);
    for key in [OpKey::Unary(UnaryOp::Sigmoid), OpKey::Unary(UnaryOp::Tanh), OpKey::Binary(BinaryOp::Multiply)] {
        assert_eq!(count(&graph, key), 0, "{key:?} left behind");
    }
}

#[test]
fn test_outputs_are_slices_of_the_cell() {
    let dims = Dims::new(2, 3, 4);
    let (mut graph, _) = single_cell(dims, Spelling::default(), None);
    crate::fuse(&mut graph, &cells_only()).unwrap();

    let [ht_result, ct_result] = graph.results() else { panic!("two results expected") };
    let (ht, ct) = (graph.input(*ht_result, 0).unwrap(), graph.input(*ct_result, 0).unwrap());
    assert_eq!(
        graph.op(ht.node).unwrap(),
        &Op::Slice {
            lower: Shape::from_slice(&[0, 0]),
            upper: Shape::from_slice(&[2, 4]),
            strides: Shape::from_slice(&[1, 1])
        }
    );
    assert_eq!(
        graph.op(ct.node).unwrap(),
        &Op::Slice {
            lower: Shape::from_slice(&[2, 0]),
            upper: Shape::from_slice(&[4, 4]),
            strides: Shape::from_slice(&[1, 1])
        }
    );
    let element = graph.producer(ct.node, 0).unwrap();
    assert_eq!(graph.op(element).unwrap(), &Op::GetOutputElement { index: 1 });
}

#[test]
fn test_fuses_spelled_out_sigmoids() {
    let spelling = Spelling { explicit_sigmoid: true, ..Default::default() };
    let (mut graph, _) = single_cell(Dims::new(2, 3, 4), spelling, None);

    let stats = crate::fuse(&mut graph, &cells_only()).unwrap();
    // Three sigmoids, then the cell.
    assert_eq!(stats.replacements("lstm_fusion"), 4);
    assert_eq!(count(&graph, OpKey::Lstm), 1);
    assert_eq!(count(&graph, OpKey::Binary(BinaryOp::Divide)), 0);
}

#[test]
fn test_orients_operands_around_constant_state() {
    let dims = Dims::new(2, 4, 4);
    let mut graph = Graph::new();
    let initial = (zero_state(&mut graph, dims), zero_state(&mut graph, dims));
    let x = param(&mut graph, &[dims.batch, dims.features]);
    let weights = LayerWeights::new(&mut graph, dims);
    let spelling = Spelling { input_first: true, ..Default::default() };
    let (ht, _) = lstm_cell(&mut graph, dims, &weights, x, initial, spelling);
    graph.add_result(ht).unwrap();

    crate::fuse(&mut graph, &cells_only()).unwrap();

    let cells = find(&graph, OpKey::Lstm);
    assert_eq!(cells.len(), 1);
    assert_eq!(graph.input(cells[0], 0).unwrap(), x);
    let weights_layer = graph.producer(cells[0], 2).unwrap();
    assert_eq!(graph.input(weights_layer, 0).unwrap(), weights.w_x);
}

#[test]
fn test_orients_operands_by_shape() {
    let spelling = Spelling { input_first: true, ..Default::default() };
    let (mut graph, x) = single_cell(Dims::new(2, 3, 5), spelling, None);

    crate::fuse(&mut graph, &cells_only()).unwrap();

    let cells = find(&graph, OpKey::Lstm);
    assert_eq!(cells.len(), 1);
    assert_eq!(graph.input(cells[0], 0).unwrap(), x);
}

#[test]
fn test_declines_unexpected_gate_order() {
    let spelling = Spelling { swap_gates: true, ..Default::default() };
    let (mut graph, _) = single_cell(Dims::new(2, 3, 4), spelling, None);
    let before = graph.ordered_nodes();

    let mut sink = CollectingSink::new();
    let stats = crate::fuse_with(&mut graph, &cells_only(), &mut sink).unwrap();
    assert!(stats.is_unchanged());
    assert!(sink.declined().any(|d| matches!(d, Diagnostic::Declined { rule: "lstm_cell", .. })));
    assert_eq!(graph.ordered_nodes(), before);
}

#[test]
fn test_fuses_every_cell_of_a_chain() {
    let dims = Dims::new(2, 3, 4);
    let mut net = network(dims, 3, 1, Spelling::default());
    let before = result_types(&net.graph);

    crate::fuse(&mut net.graph, &cells_only()).unwrap();
    assert_eq!(count(&net.graph, OpKey::Lstm), 3);
    assert_eq!(result_types(&net.graph), before);

    // Each cell reads the previous one's state through a concat of its slices.
    let cells = find(&net.graph, OpKey::Lstm);
    let src_iter = net.graph.producer(cells[2], 1).unwrap();
    assert!(matches!(net.graph.op(src_iter).unwrap(), Op::Concat { axis: 0 }));
    for state in net.graph.node(src_iter).unwrap().inputs() {
        let element = net.graph.producer(state.node, 0).unwrap();
        assert_eq!(net.graph.producer(element, 0).unwrap(), cells[1]);
    }
}
