use kiln_dtype::DType;
use snafu::Snafu;

use crate::graph::NodeId;
use crate::op::Arity;
use crate::shape::{Shape, TensorType};
use crate::types::ConstValue;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // =========================================================================
    // Construction (shape inference)
    // =========================================================================
    #[snafu(display("{op}: expected {expected} inputs, got {actual}"))]
    ArityMismatch { op: &'static str, expected: Arity, actual: usize },

    #[snafu(display("{op}: expected rank {expected}, got shape {actual:?}"))]
    RankMismatch { op: &'static str, expected: usize, actual: Shape },

    #[snafu(display("{op}: rank must be at least {min}, got shape {actual:?}"))]
    RankTooSmall { op: &'static str, min: usize, actual: Shape },

    #[snafu(display("{op}: expected shape {expected:?}, got {actual:?}"))]
    ShapeMismatch { op: &'static str, expected: Shape, actual: Shape },

    #[snafu(display("{op}: element types differ ({lhs} vs {rhs})"))]
    DTypeMismatch { op: &'static str, lhs: DType, rhs: DType },

    #[snafu(display("{op}: element type {dtype} is not supported"))]
    InvalidDType { op: &'static str, dtype: DType },

    #[snafu(display("constant {value} cannot be stored as {dtype}"))]
    ConstantTypeMismatch { value: ConstValue, dtype: DType },

    #[snafu(display("invalid permutation {order:?}: expected permutation of 0..{rank}"))]
    InvalidPermutation { order: Vec<usize>, rank: usize },

    #[snafu(display("invalid axes {axes:?}: expected strictly increasing axes below {rank}"))]
    InvalidAxes { axes: Vec<usize>, rank: usize },

    #[snafu(display("{op}: element count {input} cannot become {output}"))]
    ElementCountMismatch { op: &'static str, input: usize, output: usize },

    #[snafu(display("Slice: axis {axis} bounds [{lower}, {upper}) exceed extent {extent}"))]
    SliceBounds { axis: usize, lower: usize, upper: usize, extent: usize },

    #[snafu(display("{op}: {parameter} must be positive on every axis, got {values:?}"))]
    ZeroStride { op: &'static str, parameter: &'static str, values: Vec<usize> },

    #[snafu(display("{op}: {parameter} has {actual} entries, expected one per spatial axis ({expected})"))]
    ParameterRankMismatch { op: &'static str, parameter: &'static str, expected: usize, actual: usize },

    #[snafu(display("{op}: data has {data_channels} input channels but filters expect {filter_channels}"))]
    ChannelMismatch { op: &'static str, data_channels: usize, filter_channels: usize },

    #[snafu(display("{op}: spatial axis {axis} has non-positive extent {extent}"))]
    NonPositiveExtent { op: &'static str, axis: usize, extent: isize },

    /// A backprop op's transposed convolution failed to reproduce the forward shape.
    #[snafu(display("{op}: transposed convolution yields {actual:?}, forward shape is {expected:?}"))]
    BackpropInvariant { op: &'static str, expected: Shape, actual: Shape },

    #[snafu(display("{op}: {reason}"))]
    InvalidAttribute { op: &'static str, reason: String },

    #[snafu(display("GetOutputElement({index}) reads output {referenced} of its producer"))]
    OutputIndexMismatch { index: usize, referenced: usize },

    #[snafu(display("{op} has no adjoint"))]
    NoAdjoint { op: &'static str },

    // =========================================================================
    // Graph access and mutation
    // =========================================================================
    #[snafu(display("node {id} does not exist"))]
    NodeNotFound { id: NodeId },

    #[snafu(display("node {id} has {outputs} outputs, output {index} requested"))]
    OutputOutOfRange { id: NodeId, index: usize, outputs: usize },

    #[snafu(display("node {id} has {inputs} inputs, input {index} requested"))]
    InputOutOfRange { id: NodeId, index: usize, inputs: usize },

    #[snafu(display("replacement type {new} differs from {old}"))]
    ReplacementTypeMismatch { old: TensorType, new: TensorType },

    #[snafu(display("cannot replace a node with {old} outputs by one with {new}"))]
    OutputCountMismatch { old: usize, new: usize },

    #[snafu(display("feeding {producer} into {consumer} would create a cycle"))]
    WouldCreateCycle { consumer: NodeId, producer: NodeId },

    // =========================================================================
    // Matching and rewriting
    // =========================================================================
    #[snafu(display("label '{label}' is not bound in this match"))]
    UnboundLabel { label: String },

    #[snafu(display("rule {rule}: {reason}"))]
    InconsistentGraph { rule: &'static str, reason: String },

    #[snafu(display("pass {pass} did not reach a fixed point after {iterations} iterations"))]
    RewriteLimitExceeded { pass: String, iterations: usize },
}
