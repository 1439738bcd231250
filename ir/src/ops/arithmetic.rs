//! Elementwise operations.

use snafu::ensure;

use crate::error::*;
use crate::shape::{TensorType, ensure_same_shape};
use crate::types::UnaryOp;

pub(crate) fn infer_unary(op: UnaryOp, input: &TensorType) -> Result<TensorType> {
    ensure!(!op.requires_float() || input.dtype.is_float(), InvalidDTypeSnafu { op, dtype: input.dtype });
    ensure!(!input.dtype.is_bool(), InvalidDTypeSnafu { op, dtype: input.dtype });
    Ok(input.clone())
}

/// Both operands must agree exactly; the result has their common type.
pub(crate) fn infer_binary(op: &'static str, lhs: &TensorType, rhs: &TensorType) -> Result<TensorType> {
    ensure!(lhs.dtype == rhs.dtype, DTypeMismatchSnafu { op, lhs: lhs.dtype, rhs: rhs.dtype });
    ensure!(!lhs.dtype.is_bool(), InvalidDTypeSnafu { op, dtype: lhs.dtype });
    ensure_same_shape(op, &lhs.shape, &rhs.shape)?;
    Ok(lhs.clone())
}
