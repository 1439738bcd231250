//! Shape vocabulary and validation helpers.
//!
//! Shapes are fully concrete. Every output's shape is fixed when its node is
//! constructed; nothing here is symbolic.

use itertools::Itertools;
use smallvec::SmallVec;
use snafu::ensure;

use kiln_dtype::DType;

use crate::error::*;

/// Extents of a tensor, outermost first.
///
/// Inline capacity covers ranks up to 4 without allocating.
pub type Shape = SmallVec<[usize; 4]>;

/// Per-axis strides or dilations.
pub type Strides = SmallVec<[usize; 4]>;

/// Signed per-axis offsets (padding may be negative, meaning cropping).
pub type CoordinateDiff = SmallVec<[isize; 4]>;

/// Per-axis coordinates (slice bounds).
pub type Coordinate = SmallVec<[usize; 4]>;

/// An axis permutation.
pub type AxisVector = SmallVec<[usize; 4]>;

/// A sorted set of distinct axes.
pub type AxisSet = SmallVec<[usize; 4]>;

/// Element type and shape of one node output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{dtype}{}", fmt_shape(shape))]
pub struct TensorType {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorType {
    pub fn new(dtype: DType, shape: impl Into<Shape>) -> Self {
        Self { dtype, shape: shape.into() }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn element_count(&self) -> usize {
        shape_size(&self.shape)
    }
}

/// Render a shape as `[2, 3, 4]`.
pub fn fmt_shape(shape: &[usize]) -> String {
    format!("{shape:?}")
}

/// Number of elements; 1 for scalars.
pub fn shape_size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for `shape`.
pub fn row_major_strides(shape: &[usize]) -> Strides {
    let mut strides: Strides = smallvec::smallvec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Whether `order` is `0..order.len()` in order.
pub fn is_identity_order(order: &[usize]) -> bool {
    order.iter().enumerate().all(|(i, &axis)| i == axis)
}

/// Validate that `order` is a permutation of `0..rank`.
pub fn validate_permutation(order: &[usize], rank: usize) -> Result<()> {
    let mut seen: SmallVec<[bool; 8]> = smallvec::smallvec![false; rank];
    let valid = order.len() == rank
        && order.iter().all(|&axis| {
            let fresh = axis < rank && !seen[axis];
            if fresh {
                seen[axis] = true;
            }
            fresh
        });
    ensure!(valid, InvalidPermutationSnafu { order: order.to_vec(), rank });
    Ok(())
}

/// Inverse of a validated permutation.
pub fn invert_permutation(order: &[usize]) -> AxisVector {
    let mut inverse: AxisVector = smallvec::smallvec![0; order.len()];
    for (position, &axis) in order.iter().enumerate() {
        inverse[axis] = position;
    }
    inverse
}

/// Apply a permutation to a shape: `result[i] = shape[order[i]]`.
pub fn permute_shape(shape: &[usize], order: &[usize]) -> Shape {
    order.iter().map(|&axis| shape[axis]).collect()
}

/// Validate that `axes` are strictly increasing and below `rank`.
pub fn validate_axes(axes: &[usize], rank: usize) -> Result<()> {
    let sorted = axes.iter().tuple_windows().all(|(a, b)| a < b);
    let in_range = axes.iter().all(|&axis| axis < rank);
    ensure!(sorted && in_range, InvalidAxesSnafu { axes: axes.to_vec(), rank });
    Ok(())
}

/// `shape` with every axis in `axes` removed.
pub fn remove_axes(shape: &[usize], axes: &[usize]) -> Shape {
    shape.iter().enumerate().filter(|(i, _)| !axes.contains(i)).map(|(_, &extent)| extent).collect()
}

/// Compare two shapes, naming the operation on mismatch.
pub fn ensure_same_shape(op: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    ensure!(expected == actual, ShapeMismatchSnafu { op, expected: Shape::from(expected), actual: Shape::from(actual) });
    Ok(())
}

pub fn ensure_rank(op: &'static str, shape: &[usize], rank: usize) -> Result<()> {
    ensure!(shape.len() == rank, RankMismatchSnafu { op, expected: rank, actual: Shape::from(shape) });
    Ok(())
}
