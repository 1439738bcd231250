//! `1 / (1 + exp(-x))` to `Sigmoid(x)`.

use kiln_ir::prelude::*;

use crate::helpers::{decline, operand};

const RULE: &str = "sigmoid";

/// The spelled-out logistic function, with the constant broadcast on both sides.
pub fn pattern() -> Pat {
    let one = || Pat::broadcast(Pat::label_if("one", Predicate::Class(OpClass::Constant)));
    Pat::divide(one(), Pat::add(Pat::exp(Pat::capture("negative", Pat::negative(Pat::label("x")))), one()))
}

pub fn fuse(graph: &mut Graph, m: &Match) -> Result<RewriteOutcome> {
    let root = m.root();
    let dtype = graph.node(root)?.dtype();
    if !dtype.is_float() {
        return decline(RULE, format_args!("{dtype} is not a float type"));
    }

    let one = m.node("one")?;
    match graph.op(one)? {
        Op::Constant { value, shape, .. } if shape.is_empty() && value.is_one() => {}
        other => return decline(RULE, format_args!("{other} is not the scalar one")),
    }

    let negative = m.node("negative")?;
    let x = operand(graph, negative, m.node("x")?, RULE)?;
    let sigmoid = graph.sigmoid(x)?;
    graph.replace_node(root, sigmoid.node)?;
    tracing::debug!(%root, sigmoid = %sigmoid.node, "fused sigmoid");
    Ok(RewriteOutcome::Replaced)
}
