use kiln_ir::prelude::*;
use kiln_ir::rewrite::{CollectingSink, Diagnostic};

use crate::test::graphs::*;
use crate::{FusionConfig, fusion_pipeline};

#[test]
fn test_pipeline_order() {
    let pipeline = fusion_pipeline(&FusionConfig::default()).unwrap();
    let names: Vec<&str> = pipeline.passes().iter().map(|pass| pass.name()).collect();
    assert_eq!(names, ["lstm_fusion", "rnn_fusion", "multi_layer_rnn_fusion"]);

    let rules: Vec<&str> = pipeline.passes()[0].rule_names().collect();
    assert_eq!(rules, ["sigmoid", "lstm_cell"]);
}

#[test]
fn test_pipeline_skips_disabled_passes() {
    let config = FusionConfig::builder().sigmoid(false).lstm_cell(false).build();
    let pipeline = fusion_pipeline(&config).unwrap();
    let names: Vec<&str> = pipeline.passes().iter().map(|pass| pass.name()).collect();
    assert_eq!(names, ["rnn_fusion", "multi_layer_rnn_fusion"]);

    assert!(fusion_pipeline(&FusionConfig::disabled()).unwrap().passes().is_empty());
}

#[test]
fn test_explicit_network_ends_as_one_rnn() {
    let spelling = Spelling { explicit_sigmoid: true, ..Default::default() };
    let mut net = network(Dims::new(3, 5, 5), 4, 2, spelling);
    let before = result_types(&net.graph);

    crate::fuse(&mut net.graph, &FusionConfig::default()).unwrap();
    assert_eq!(result_types(&net.graph), before);
    assert_eq!(count(&net.graph, OpKey::Lstm), 0);
    assert_eq!(count(&net.graph, OpKey::Binary(BinaryOp::Divide)), 0);

    let attrs = rnn_attrs(&net.graph);
    assert_eq!(attrs.len(), 1);
    assert_eq!((attrs[0].num_timesteps, attrs[0].num_fused_layers), (4, 2));
}

#[test]
fn test_second_run_changes_nothing() {
    let mut net = network(Dims::new(2, 4, 4), 3, 2, Spelling::default());
    let config = FusionConfig::default();
    assert!(!crate::fuse(&mut net.graph, &config).unwrap().is_unchanged());

    let nodes = net.graph.ordered_nodes();
    let stats = crate::fuse(&mut net.graph, &config).unwrap();
    assert!(stats.is_unchanged());
    assert_eq!(net.graph.ordered_nodes(), nodes);
}

#[test]
fn test_sink_sees_every_pass_finish() {
    let mut net = network(Dims::new(2, 3, 4), 2, 1, Spelling::default());
    let mut sink = CollectingSink::new();
    let stats = crate::fuse_with(&mut net.graph, &FusionConfig::default(), &mut sink).unwrap();

    let finished: Vec<&str> = sink
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::PassFinished { .. }))
        .map(|d| d.pass())
        .collect();
    assert_eq!(finished, ["lstm_fusion", "rnn_fusion", "multi_layer_rnn_fusion"]);
    assert_eq!(sink.replaced().count(), stats.total_replacements());
}

#[test]
fn test_disabled_leaves_graph_alone() {
    let mut net = network(Dims::new(2, 3, 4), 2, 1, Spelling::default());
    let nodes = net.graph.ordered_nodes();

    let stats = crate::fuse(&mut net.graph, &FusionConfig::disabled()).unwrap();
    assert!(stats.passes.is_empty());
    assert_eq!(net.graph.ordered_nodes(), nodes);
}

#[test]
fn test_rewrite_limit_surfaces() {
    let mut net = network(Dims::new(2, 3, 4), 2, 1, Spelling { explicit_sigmoid: true, ..Default::default() });
    let config = FusionConfig::builder().rewrite(RewriteConfig::builder().max_iterations(1).build()).build();

    let err = crate::fuse(&mut net.graph, &config).unwrap_err();
    assert!(matches!(err, kiln_ir::Error::RewriteLimitExceeded { .. }), "{err}");
}
