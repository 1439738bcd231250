//! The closed set of graph operations.
//!
//! Every operation is one variant of [`Op`]; its parameters live inline in the
//! variant. Shape inference is in [`crate::ops`], adjoint rules in
//! [`crate::autodiff`]. Both dispatch exhaustively on the variant, so adding an
//! operation is a compile error until every contract method handles it.

use std::fmt;

use kiln_dtype::DType;

use crate::ops::convolution::ConvolutionParams;
use crate::ops::recurrent::RnnAttrs;
use crate::shape::{AxisSet, AxisVector, Coordinate, Shape, Strides};
use crate::types::{BinaryOp, ConstValue, OpClass, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Externally supplied tensor (function argument or learnable weight).
    Parameter { dtype: DType, shape: Shape },
    /// Tensor filled with a single scalar.
    Constant { value: ConstValue, dtype: DType, shape: Shape },
    /// Marks a graph output; identity on its input.
    Result,

    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Gradient of Relu: inputs are (forward argument, delta).
    ReluBackprop,

    /// Insert new axes `axes` so the result has `shape`.
    Broadcast { shape: Shape, axes: AxisSet },
    /// Sum-reduce over `axes`.
    Sum { axes: AxisSet },
    /// Permute by `input_order`, then reinterpret row-major as `shape`.
    Reshape { input_order: AxisVector, shape: Shape },
    Slice { lower: Coordinate, upper: Coordinate, strides: Strides },
    Concat { axis: usize },
    /// Tensor contraction over the last axis of the first operand and the
    /// first axis of the second.
    Dot,
    /// Forwards one output of a multi-output producer.
    GetOutputElement { index: usize },

    /// Inputs: (data batch, filters).
    Convolution(ConvolutionParams),
    /// Inputs: (filters, output delta).
    ConvolutionBackpropData { data_batch_shape: Shape, forward: ConvolutionParams },
    /// Inputs: (data batch, output delta).
    ConvolutionBackpropFilters { filters_shape: Shape, forward: ConvolutionParams },

    /// One fused LSTM cell.
    ///
    /// Inputs: (src_layer, src_iter, weights_layer, weights_iter, bias).
    /// Outputs: hidden state, then hidden and cell state stacked along axis 0.
    Lstm,
    /// A fused sequence of LSTM cells, optionally stacked in layers.
    ///
    /// Same inputs as [`Op::Lstm`], concatenated over timesteps and layers.
    /// Outputs: the hidden sequence of the last layer, then one `[h; c]`
    /// block per layer.
    Rnn(RnnAttrs),
}

/// Identity of an operation as seen by the pattern matcher.
///
/// Parameters are ignored; grouped ops keep their sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr)]
pub enum OpKey {
    Parameter,
    Constant,
    Result,
    Unary(UnaryOp),
    Binary(BinaryOp),
    ReluBackprop,
    Broadcast,
    Sum,
    Reshape,
    Slice,
    Concat,
    Dot,
    GetOutputElement,
    Convolution,
    ConvolutionBackpropData,
    ConvolutionBackpropFilters,
    Lstm,
    Rnn,
}

/// Number of inputs an operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Arity {
    #[display("{_0}")]
    Exactly(usize),
    #[display("at least {_0}")]
    AtLeast(usize),
}

impl Arity {
    pub const fn accepts(&self, count: usize) -> bool {
        match *self {
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
        }
    }
}

impl Op {
    pub fn key(&self) -> OpKey {
        match self {
            Self::Parameter { .. } => OpKey::Parameter,
            Self::Constant { .. } => OpKey::Constant,
            Self::Result => OpKey::Result,
            Self::Unary(op) => OpKey::Unary(*op),
            Self::Binary(op) => OpKey::Binary(*op),
            Self::ReluBackprop => OpKey::ReluBackprop,
            Self::Broadcast { .. } => OpKey::Broadcast,
            Self::Sum { .. } => OpKey::Sum,
            Self::Reshape { .. } => OpKey::Reshape,
            Self::Slice { .. } => OpKey::Slice,
            Self::Concat { .. } => OpKey::Concat,
            Self::Dot => OpKey::Dot,
            Self::GetOutputElement { .. } => OpKey::GetOutputElement,
            Self::Convolution(_) => OpKey::Convolution,
            Self::ConvolutionBackpropData { .. } => OpKey::ConvolutionBackpropData,
            Self::ConvolutionBackpropFilters { .. } => OpKey::ConvolutionBackpropFilters,
            Self::Lstm => OpKey::Lstm,
            Self::Rnn(_) => OpKey::Rnn,
        }
    }

    /// Human-readable operation name used in errors and tree dumps.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unary(op) => op.into(),
            Self::Binary(op) => op.into(),
            other => other.key().into(),
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Parameter { .. } | Self::Constant { .. } => Arity::Exactly(0),
            Self::Result
            | Self::Unary(_)
            | Self::Broadcast { .. }
            | Self::Sum { .. }
            | Self::Reshape { .. }
            | Self::Slice { .. }
            | Self::GetOutputElement { .. } => Arity::Exactly(1),
            Self::Binary(_)
            | Self::ReluBackprop
            | Self::Dot
            | Self::Convolution(_)
            | Self::ConvolutionBackpropData { .. }
            | Self::ConvolutionBackpropFilters { .. } => Arity::Exactly(2),
            Self::Concat { .. } => Arity::AtLeast(1),
            Self::Lstm | Self::Rnn(_) => Arity::Exactly(5),
        }
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, Self::Binary(op) if op.is_commutative())
    }

    pub fn class(&self) -> OpClass {
        match self {
            Self::Parameter { .. } => OpClass::Parameter,
            Self::Constant { .. } => OpClass::Constant,
            Self::Broadcast { .. } | Self::Reshape { .. } => OpClass::LayoutOnly,
            Self::Unary(_) | Self::Binary(_) | Self::ReluBackprop => OpClass::Elementwise,
            _ => OpClass::Other,
        }
    }

    /// Operations without inputs.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Parameter { .. } | Self::Constant { .. })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter { dtype, shape } => write!(f, "Parameter({dtype}{shape:?})"),
            Self::Constant { value, dtype, shape } => write!(f, "Constant({value}: {dtype}{shape:?})"),
            Self::Broadcast { shape, axes } => write!(f, "Broadcast(shape={shape:?}, axes={axes:?})"),
            Self::Sum { axes } => write!(f, "Sum(axes={axes:?})"),
            Self::Reshape { input_order, shape } => write!(f, "Reshape(order={input_order:?}, shape={shape:?})"),
            Self::Slice { lower, upper, strides } => {
                write!(f, "Slice(lower={lower:?}, upper={upper:?}, strides={strides:?})")
            }
            Self::Concat { axis } => write!(f, "Concat(axis={axis})"),
            Self::GetOutputElement { index } => write!(f, "GetOutputElement({index})"),
            Self::Convolution(params) => write!(f, "Convolution({params})"),
            Self::ConvolutionBackpropData { data_batch_shape, forward } => {
                write!(f, "ConvolutionBackpropData(data_batch_shape={data_batch_shape:?}, {forward})")
            }
            Self::ConvolutionBackpropFilters { filters_shape, forward } => {
                write!(f, "ConvolutionBackpropFilters(filters_shape={filters_shape:?}, {forward})")
            }
            Self::Rnn(attrs) => write!(f, "Rnn({attrs})"),
            other => f.write_str(other.name()),
        }
    }
}
