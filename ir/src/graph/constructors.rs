//! Typed shorthands over [`Graph::add_node`].
//!
//! Each constructor builds the [`Op`] variant and returns the new node's
//! first output, so calls compose: `g.exp(g.negative(x)?)?`.

use smallvec::SmallVec;

use super::{Graph, NodeId, Value};
use crate::error::Result;
use crate::op::Op;
use crate::ops::convolution::ConvolutionParams;
use crate::ops::recurrent::RnnAttrs;
use crate::shape::{Shape, Strides};
use crate::types::{BinaryOp, ConstValue, UnaryOp};

impl Graph {
    fn single(&mut self, op: Op, inputs: impl IntoIterator<Item = Value>) -> Result<Value> {
        self.add_node(op, inputs).map(Value::from)
    }

    pub fn unary(&mut self, op: UnaryOp, x: impl Into<Value>) -> Result<Value> {
        self.single(Op::Unary(op), [x.into()])
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<Value> {
        self.single(Op::Binary(op), [lhs.into(), rhs.into()])
    }

    pub fn negative(&mut self, x: impl Into<Value>) -> Result<Value> {
        self.unary(UnaryOp::Negative, x)
    }

    pub fn exp(&mut self, x: impl Into<Value>) -> Result<Value> {
        self.unary(UnaryOp::Exp, x)
    }

    pub fn tanh(&mut self, x: impl Into<Value>) -> Result<Value> {
        self.unary(UnaryOp::Tanh, x)
    }

    pub fn sigmoid(&mut self, x: impl Into<Value>) -> Result<Value> {
        self.unary(UnaryOp::Sigmoid, x)
    }

    pub fn add(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<Value> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn subtract(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<Value> {
        self.binary(BinaryOp::Subtract, lhs, rhs)
    }

    pub fn multiply(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<Value> {
        self.binary(BinaryOp::Multiply, lhs, rhs)
    }

    pub fn divide(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<Value> {
        self.binary(BinaryOp::Divide, lhs, rhs)
    }

    /// Constant shaped like `like`, filled with `value`.
    pub fn constant_like(&mut self, value: ConstValue, like: impl Into<Value>) -> Result<Value> {
        let ty = self.ty(like.into())?.clone();
        self.add_constant(value, ty.dtype, ty.shape).map(Value::from)
    }

    pub fn broadcast(&mut self, x: impl Into<Value>, shape: &[usize], axes: &[usize]) -> Result<Value> {
        self.single(Op::Broadcast { shape: Shape::from(shape), axes: axes.into() }, [x.into()])
    }

    pub fn sum(&mut self, x: impl Into<Value>, axes: &[usize]) -> Result<Value> {
        self.single(Op::Sum { axes: axes.into() }, [x.into()])
    }

    pub fn reshape(&mut self, x: impl Into<Value>, input_order: &[usize], shape: &[usize]) -> Result<Value> {
        self.single(Op::Reshape { input_order: input_order.into(), shape: Shape::from(shape) }, [x.into()])
    }

    /// Swap the two axes of a matrix.
    pub fn transpose(&mut self, x: impl Into<Value>) -> Result<Value> {
        let x = x.into();
        let shape = self.shape(x)?.clone();
        let transposed: SmallVec<[usize; 4]> = shape.iter().rev().copied().collect();
        self.reshape(x, &[1, 0], &transposed)
    }

    /// Unit-stride slice `[lower, upper)`.
    pub fn slice(&mut self, x: impl Into<Value>, lower: &[usize], upper: &[usize]) -> Result<Value> {
        let strides: Strides = smallvec::smallvec![1; lower.len()];
        self.strided_slice(x, lower, upper, &strides)
    }

    pub fn strided_slice(
        &mut self,
        x: impl Into<Value>,
        lower: &[usize],
        upper: &[usize],
        strides: &[usize],
    ) -> Result<Value> {
        let op = Op::Slice { lower: lower.into(), upper: upper.into(), strides: strides.into() };
        self.single(op, [x.into()])
    }

    pub fn concat(&mut self, values: impl IntoIterator<Item = Value>, axis: usize) -> Result<Value> {
        self.single(Op::Concat { axis }, values)
    }

    pub fn dot(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<Value> {
        self.single(Op::Dot, [lhs.into(), rhs.into()])
    }

    /// Forward output `value.index` of a multi-output node.
    pub fn get_output_element(&mut self, value: Value) -> Result<Value> {
        self.single(Op::GetOutputElement { index: value.index }, [value])
    }

    pub fn convolution(
        &mut self,
        data: impl Into<Value>,
        filters: impl Into<Value>,
        params: ConvolutionParams,
    ) -> Result<Value> {
        self.single(Op::Convolution(params), [data.into(), filters.into()])
    }

    pub fn convolution_backprop_data(
        &mut self,
        data_batch_shape: &[usize],
        filters: impl Into<Value>,
        delta: impl Into<Value>,
        forward: ConvolutionParams,
    ) -> Result<Value> {
        let op = Op::ConvolutionBackpropData { data_batch_shape: Shape::from(data_batch_shape), forward };
        self.single(op, [filters.into(), delta.into()])
    }

    pub fn convolution_backprop_filters(
        &mut self,
        data: impl Into<Value>,
        filters_shape: &[usize],
        delta: impl Into<Value>,
        forward: ConvolutionParams,
    ) -> Result<Value> {
        let op = Op::ConvolutionBackpropFilters { filters_shape: Shape::from(filters_shape), forward };
        self.single(op, [data.into(), delta.into()])
    }

    /// A fused LSTM cell; returns the node (two outputs).
    pub fn lstm(&mut self, inputs: [Value; 5]) -> Result<NodeId> {
        self.add_node(Op::Lstm, inputs)
    }

    /// A fused RNN; returns the node (two outputs).
    pub fn rnn(&mut self, attrs: RnnAttrs, inputs: [Value; 5]) -> Result<NodeId> {
        self.add_node(Op::Rnn(attrs), inputs)
    }
}
