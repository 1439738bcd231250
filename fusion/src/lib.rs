//! Operator fusion passes for the Kiln graph IR.
//!
//! The passes rewrite spelled-out recurrent networks into fused operations:
//!
//! 1. `lstm_fusion`: the logistic function to [`Sigmoid`](kiln_ir::UnaryOp::Sigmoid),
//!    then each unrolled LSTM cell to an [`Lstm`](kiln_ir::Op::Lstm) node.
//! 2. `rnn_fusion`: chains of cells sharing weights to one
//!    [`Rnn`](kiln_ir::Op::Rnn), and concatenations of adjacent slices back
//!    to the value they were cut from.
//! 3. `multi_layer_rnn_fusion`: stacked `Rnn` layers to one multi-layer `Rnn`.
//!
//! ```rust,ignore
//! let stats = kiln_fusion::fuse(&mut graph, &FusionConfig::from_env())?;
//! ```

pub mod config;
pub mod lstm;
pub mod multi_layer;
pub mod rnn;
pub mod sigmoid;

mod helpers;


pub use config::FusionConfig;

use kiln_ir::rewrite::{DiagnosticSink, TracingSink};
use kiln_ir::{Graph, GraphRewrite, Matcher, PassManager, Result, RewriteStats};

/// The enabled fusion passes in dependency order.
pub fn fusion_pipeline(config: &FusionConfig) -> Result<PassManager> {
    let mut manager = PassManager::new(config.rewrite);

    let mut cells = GraphRewrite::new("lstm_fusion");
    if config.sigmoid {
        cells = cells.rule("sigmoid", Matcher::new(sigmoid::pattern()), sigmoid::fuse);
    }
    if config.lstm_cell {
        cells = cells.rule("lstm_cell", Matcher::new(lstm::pattern()), lstm::fuse);
    }
    if !cells.is_empty() {
        manager.push(cells);
    }

    if config.rnn {
        manager.push(
            GraphRewrite::new("rnn_fusion")
                .recurrent_rule("rnn", rnn::matcher()?, rnn::fuse)
                .rule("concat_slices", Matcher::new(rnn::concat_pattern()), rnn::fuse_concat_slices),
        );
    }
    if config.multi_layer_rnn {
        manager.push(GraphRewrite::new("multi_layer_rnn_fusion").recurrent_rule(
            "multi_layer_rnn",
            multi_layer::matcher()?,
            multi_layer::fuse,
        ));
    }

    tracing::debug!(passes = manager.passes().len(), "fusion pipeline built");
    Ok(manager)
}

/// Run the enabled fusions to their fixed points, reporting to `tracing`.
pub fn fuse(graph: &mut Graph, config: &FusionConfig) -> Result<RewriteStats> {
    fuse_with(graph, config, &mut TracingSink)
}

pub fn fuse_with(graph: &mut Graph, config: &FusionConfig, sink: &mut dyn DiagnosticSink) -> Result<RewriteStats> {
    fusion_pipeline(config)?.run(graph, sink)
}
