//! Per-operation adjoint rules.

use smallvec::{SmallVec, smallvec};
use snafu::ensure;

use crate::error::*;
use crate::graph::{Graph, NodeId, Value};
use crate::op::Op;
use crate::shape::{AxisVector, Coordinate, invert_permutation, is_identity_order, permute_shape};
use crate::types::{BinaryOp, ConstValue, UnaryOp};

/// One delta per input of the differentiated node.
pub type InputDeltas = SmallVec<[Value; 4]>;

/// Build the gradient subgraph of node `id`.
///
/// `deltas` holds one delta per output of `id`, each typed like that
/// output. Returns one delta per input, typed like that input.
pub fn differentiate(graph: &mut Graph, id: NodeId, deltas: &[Value]) -> Result<InputDeltas> {
    let node = graph.node(id)?;
    let op = node.op().clone();
    let name = op.name();
    let inputs: SmallVec<[Value; 4]> = node.inputs().into();
    let outputs = node.outputs().len();
    ensure!(
        deltas.len() == outputs,
        InvalidAttributeSnafu { op: name, reason: format!("{} deltas for {outputs} outputs", deltas.len()) }
    );
    for (index, &delta) in deltas.iter().enumerate() {
        let expected = graph.ty(Value::new(id, index))?;
        let actual = graph.ty(delta)?;
        ensure!(expected.dtype == actual.dtype, DTypeMismatchSnafu { op: name, lhs: expected.dtype, rhs: actual.dtype });
        ensure!(
            expected.shape == actual.shape,
            ShapeMismatchSnafu { op: name, expected: expected.shape.clone(), actual: actual.shape.clone() }
        );
    }

    let output = Value::from(id);
    let d = deltas[0];
    Ok(match op {
        Op::Parameter { .. } | Op::Constant { .. } => smallvec![],
        Op::Result | Op::GetOutputElement { .. } => smallvec![d],

        Op::Unary(UnaryOp::Negative) => smallvec![graph.negative(d)?],
        Op::Unary(UnaryOp::Exp) => smallvec![graph.multiply(d, output)?],
        Op::Unary(UnaryOp::Log) => smallvec![graph.divide(d, inputs[0])?],
        Op::Unary(UnaryOp::Tanh) => {
            let one = one_like(graph, output)?;
            let squared = graph.multiply(output, output)?;
            let slope = graph.subtract(one, squared)?;
            smallvec![graph.multiply(d, slope)?]
        }
        Op::Unary(UnaryOp::Sigmoid) => {
            let one = one_like(graph, output)?;
            let complement = graph.subtract(one, output)?;
            let slope = graph.multiply(output, complement)?;
            smallvec![graph.multiply(d, slope)?]
        }
        Op::Unary(UnaryOp::Relu) => smallvec![Value::from(graph.add_node(Op::ReluBackprop, [inputs[0], d])?)],

        Op::Binary(BinaryOp::Add) => smallvec![d, d],
        Op::Binary(BinaryOp::Subtract) => smallvec![d, graph.negative(d)?],
        Op::Binary(BinaryOp::Multiply) => {
            let (x, y) = (inputs[0], inputs[1]);
            smallvec![graph.multiply(d, y)?, graph.multiply(d, x)?]
        }
        Op::Binary(BinaryOp::Divide) => {
            let (x, y) = (inputs[0], inputs[1]);
            let dx = graph.divide(d, y)?;
            let numerator = graph.multiply(d, x)?;
            let denominator = graph.multiply(y, y)?;
            let quotient = graph.divide(numerator, denominator)?;
            smallvec![dx, graph.negative(quotient)?]
        }

        Op::Broadcast { axes, .. } => smallvec![graph.sum(d, &axes)?],
        Op::Sum { axes } => {
            let shape = graph.shape(inputs[0])?.clone();
            smallvec![graph.broadcast(d, &shape, &axes)?]
        }
        Op::Reshape { input_order, .. } => {
            let shape = graph.shape(inputs[0])?.clone();
            let permuted = permute_shape(&shape, &input_order);
            let identity: AxisVector = (0..graph.shape(d)?.len()).collect();
            let mut delta = graph.reshape(d, &identity, &permuted)?;
            if !is_identity_order(&input_order) {
                delta = graph.reshape(delta, &invert_permutation(&input_order), &shape)?;
            }
            smallvec![delta]
        }
        Op::Concat { axis } => {
            let upper_bound = graph.shape(d)?.clone();
            let mut offset = 0;
            let mut input_deltas = InputDeltas::new();
            for input in &inputs {
                let extent = graph.shape(*input)?[axis];
                let mut lower: Coordinate = smallvec![0; upper_bound.len()];
                let mut upper: Coordinate = upper_bound.iter().copied().collect();
                lower[axis] = offset;
                upper[axis] = offset + extent;
                input_deltas.push(graph.slice(d, &lower, &upper)?);
                offset += extent;
            }
            input_deltas
        }
        Op::Dot => {
            let (a, b) = (inputs[0], inputs[1]);
            let matrices = graph.shape(a)?.len() == 2 && graph.shape(b)?.len() == 2;
            ensure!(matrices, NoAdjointSnafu { op: "Dot over non-matrix operands" });
            let b_t = graph.transpose(b)?;
            let a_t = graph.transpose(a)?;
            smallvec![graph.dot(d, b_t)?, graph.dot(a_t, d)?]
        }
        Op::Convolution(params) => {
            let (data, filters) = (inputs[0], inputs[1]);
            let data_shape = graph.shape(data)?.clone();
            let filters_shape = graph.shape(filters)?.clone();
            let data_delta = graph.convolution_backprop_data(&data_shape, filters, d, params.clone())?;
            let filters_delta = graph.convolution_backprop_filters(data, &filters_shape, d, params)?;
            smallvec![data_delta, filters_delta]
        }

        Op::Binary(BinaryOp::Maximum)
        | Op::ReluBackprop
        | Op::Slice { .. }
        | Op::ConvolutionBackpropData { .. }
        | Op::ConvolutionBackpropFilters { .. }
        | Op::Lstm
        | Op::Rnn(_) => return NoAdjointSnafu { op: name }.fail(),
    })
}

fn one_like(graph: &mut Graph, like: Value) -> Result<Value> {
    let dtype = graph.dtype(like)?;
    graph.constant_like(ConstValue::one(dtype), like)
}
