//! Shape and type inference for every [`Op`].
//!
//! Operations are grouped by category:
//! - `arithmetic`: unary/binary elementwise ops and their gradient helpers
//! - `movement`: broadcast, reshape, slice, concat, output selection
//! - `reduction`: sum and dot
//! - `convolution`: forward convolution and both backprop operations
//! - `recurrent`: fused LSTM cell and RNN

use smallvec::{SmallVec, smallvec};
use snafu::ensure;

use crate::error::*;
use crate::op::Op;
use crate::shape::TensorType;

pub mod arithmetic;
pub mod convolution;
pub mod movement;
pub mod recurrent;
pub mod reduction;

/// Types of every output of one node.
pub type OutputTypes = SmallVec<[TensorType; 2]>;

impl Op {
    /// Compute output types from input types.
    ///
    /// Pure and deterministic: the same op over the same input types always
    /// infers the same outputs. Fails on any arity, rank, type or extent
    /// violation, naming the operation.
    pub fn infer(&self, inputs: &[TensorType]) -> Result<OutputTypes> {
        let arity = self.arity();
        ensure!(arity.accepts(inputs.len()), ArityMismatchSnafu { op: self.name(), expected: arity, actual: inputs.len() });

        let single = |ty: TensorType| -> OutputTypes { smallvec![ty] };
        Ok(match self {
            Self::Parameter { dtype, shape } => single(TensorType::new(*dtype, shape.clone())),
            Self::Constant { value, dtype, shape } => {
                ensure!(value.fits(*dtype), ConstantTypeMismatchSnafu { value: *value, dtype: *dtype });
                single(TensorType::new(*dtype, shape.clone()))
            }
            Self::Result | Self::GetOutputElement { .. } => single(inputs[0].clone()),
            Self::Unary(op) => single(arithmetic::infer_unary(*op, &inputs[0])?),
            Self::Binary(op) => single(arithmetic::infer_binary(op.into(), &inputs[0], &inputs[1])?),
            Self::ReluBackprop => single(arithmetic::infer_binary("ReluBackprop", &inputs[0], &inputs[1])?),
            Self::Broadcast { shape, axes } => single(movement::infer_broadcast(&inputs[0], shape, axes)?),
            Self::Sum { axes } => single(reduction::infer_sum(&inputs[0], axes)?),
            Self::Reshape { input_order, shape } => single(movement::infer_reshape(&inputs[0], input_order, shape)?),
            Self::Slice { lower, upper, strides } => single(movement::infer_slice(&inputs[0], lower, upper, strides)?),
            Self::Concat { axis } => single(movement::infer_concat(inputs, *axis)?),
            Self::Dot => single(reduction::infer_dot(&inputs[0], &inputs[1])?),
            Self::Convolution(params) => single(convolution::infer_forward(&inputs[0], &inputs[1], params)?),
            Self::ConvolutionBackpropData { data_batch_shape, forward } => {
                single(convolution::infer_backprop_data(data_batch_shape, &inputs[0], &inputs[1], forward)?)
            }
            Self::ConvolutionBackpropFilters { filters_shape, forward } => {
                single(convolution::infer_backprop_filters(&inputs[0], filters_shape, &inputs[1], forward)?)
            }
            Self::Lstm => recurrent::infer_lstm(inputs)?,
            Self::Rnn(attrs) => recurrent::infer_rnn(attrs, inputs)?,
        })
    }
}
