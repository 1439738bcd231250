//! Reductions: axis sums and the dot product.

use snafu::ensure;

use crate::error::*;
use crate::shape::{Shape, TensorType, remove_axes, validate_axes};

pub(crate) fn infer_sum(input: &TensorType, axes: &[usize]) -> Result<TensorType> {
    validate_axes(axes, input.rank())?;
    Ok(TensorType::new(input.dtype, remove_axes(&input.shape, axes)))
}

/// Contract the last axis of `lhs` with the first axis of `rhs`.
///
/// A scalar operand scales the other one instead.
pub(crate) fn infer_dot(lhs: &TensorType, rhs: &TensorType) -> Result<TensorType> {
    ensure!(lhs.dtype == rhs.dtype, DTypeMismatchSnafu { op: "Dot", lhs: lhs.dtype, rhs: rhs.dtype });
    ensure!(!lhs.dtype.is_bool(), InvalidDTypeSnafu { op: "Dot", dtype: lhs.dtype });

    if lhs.rank() == 0 {
        return Ok(rhs.clone());
    }
    if rhs.rank() == 0 {
        return Ok(lhs.clone());
    }

    let reduced = lhs.shape[lhs.rank() - 1];
    ensure!(
        reduced == rhs.shape[0],
        ShapeMismatchSnafu { op: "Dot", expected: Shape::from_slice(&[reduced]), actual: Shape::from_slice(&rhs.shape[..1]) }
    );

    let shape: Shape = lhs.shape[..lhs.rank() - 1].iter().chain(&rhs.shape[1..]).copied().collect();
    Ok(TensorType::new(lhs.dtype, shape))
}
