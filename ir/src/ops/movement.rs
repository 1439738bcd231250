//! Layout operations: broadcast, reshape, slice and concat.
//!
//! None of these compute on element values, so all of them preserve the
//! element type.

use snafu::ensure;

use crate::error::*;
use crate::shape::{Shape, TensorType, ensure_same_shape, remove_axes, shape_size, validate_axes, validate_permutation};

/// Broadcast adds the axes in `axes`; removing them from `shape` must give the input shape.
pub(crate) fn infer_broadcast(input: &TensorType, shape: &[usize], axes: &[usize]) -> Result<TensorType> {
    validate_axes(axes, shape.len())?;
    ensure_same_shape("Broadcast", &remove_axes(shape, axes), &input.shape)?;
    Ok(TensorType::new(input.dtype, Shape::from(shape)))
}

pub(crate) fn infer_reshape(input: &TensorType, input_order: &[usize], shape: &[usize]) -> Result<TensorType> {
    validate_permutation(input_order, input.rank())?;
    let (from, to) = (input.element_count(), shape_size(shape));
    ensure!(from == to, ElementCountMismatchSnafu { op: "Reshape", input: from, output: to });
    Ok(TensorType::new(input.dtype, Shape::from(shape)))
}

pub(crate) fn infer_slice(input: &TensorType, lower: &[usize], upper: &[usize], strides: &[usize]) -> Result<TensorType> {
    let rank = input.rank();
    for (parameter, len) in [("lower bounds", lower.len()), ("upper bounds", upper.len()), ("strides", strides.len())] {
        ensure!(len == rank, ParameterRankMismatchSnafu { op: "Slice", parameter, expected: rank, actual: len });
    }
    ensure!(strides.iter().all(|&s| s > 0), ZeroStrideSnafu { op: "Slice", parameter: "strides", values: strides.to_vec() });

    let mut shape = Shape::with_capacity(rank);
    for axis in 0..rank {
        let (lo, hi, extent) = (lower[axis], upper[axis], input.shape[axis]);
        ensure!(lo <= hi && hi <= extent, SliceBoundsSnafu { axis, lower: lo, upper: hi, extent });
        shape.push((hi - lo).div_ceil(strides[axis]));
    }
    Ok(TensorType::new(input.dtype, shape))
}

/// All inputs agree on type, rank, and every extent but `axis`.
pub(crate) fn infer_concat(inputs: &[TensorType], axis: usize) -> Result<TensorType> {
    let first = &inputs[0];
    let rank = first.rank();
    ensure!(axis < rank, InvalidAxesSnafu { axes: vec![axis], rank });

    let mut shape = first.shape.clone();
    for input in &inputs[1..] {
        ensure!(input.dtype == first.dtype, DTypeMismatchSnafu { op: "Concat", lhs: first.dtype, rhs: input.dtype });
        ensure!(input.rank() == rank, RankMismatchSnafu { op: "Concat", expected: rank, actual: input.shape.clone() });
        let mismatch = (0..rank).any(|i| i != axis && input.shape[i] != first.shape[i]);
        ensure!(!mismatch, ShapeMismatchSnafu { op: "Concat", expected: first.shape.clone(), actual: input.shape.clone() });
        shape[axis] += input.shape[axis];
    }
    Ok(TensorType::new(first.dtype, shape))
}
