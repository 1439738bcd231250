//! Type definitions shared by operations and patterns.
//!
//! Constant payloads, elementwise operation kinds and the coarse operation
//! classes that label predicates test against.

use kiln_dtype::DType;

/// Scalar payload of a splat constant.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub const fn zero(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(false),
            Int8 | Int16 | Int32 | Int64 => Self::Int(0),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(0.0),
        }
    }

    pub const fn one(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(true),
            Int8 | Int16 | Int32 | Int64 => Self::Int(1),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(1),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(1.0),
        }
    }

    /// Whether this payload can be stored in an element of `dtype`.
    pub const fn fits(&self, dtype: DType) -> bool {
        match self {
            Self::Bool(_) => dtype.is_bool(),
            Self::Int(_) => dtype.is_int() && !dtype.is_unsigned(),
            Self::UInt(_) => dtype.is_int(),
            Self::Float(_) => dtype.is_float(),
        }
    }

    pub fn is_one(&self) -> bool {
        match *self {
            Self::Int(v) => v == 1,
            Self::UInt(v) => v == 1,
            Self::Float(v) => v == 1.0,
            Self::Bool(v) => v,
        }
    }
}

/// Elementwise unary operations.
///
/// All of them preserve the input type and shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::IntoStaticStr, strum::EnumIter)]
pub enum UnaryOp {
    /// -x
    Negative,
    /// e^x (float only)
    Exp,
    /// ln(x) (float only)
    Log,
    /// tanh(x) (float only)
    Tanh,
    /// 1 / (1 + e^-x) (float only)
    Sigmoid,
    /// max(x, 0)
    Relu,
}

impl UnaryOp {
    pub const fn requires_float(&self) -> bool {
        matches!(self, Self::Exp | Self::Log | Self::Tanh | Self::Sigmoid)
    }
}

/// Elementwise binary operations.
///
/// Operands must agree on element type and shape; broadcasting is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::IntoStaticStr, strum::EnumIter)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
}

impl BinaryOp {
    pub const fn is_commutative(&self) -> bool {
        matches!(self, Self::Add | Self::Multiply | Self::Maximum)
    }
}

/// Coarse operation class used by label predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum OpClass {
    /// Learnable or externally supplied input.
    Parameter,
    Constant,
    /// Broadcast or Reshape: rearranges elements without computing on them.
    LayoutOnly,
    Elementwise,
    Other,
}
