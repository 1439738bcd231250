pub mod ext;

#[cfg(any(test, feature = "proptest"))]
pub mod proptest_gen;


/// Element type of a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::AsRefStr)]
#[derive(derive_more::Display)]
#[cfg_attr(feature = "proptest", derive(proptest_derive::Arbitrary))]
pub enum DType {
    #[display("boolean")]
    Bool = 0,

    #[display("i8")]
    Int8 = 1,
    #[display("u8")]
    UInt8 = 2,
    #[display("i16")]
    Int16 = 3,
    #[display("u16")]
    UInt16 = 4,
    #[display("i32")]
    Int32 = 5,
    #[display("u32")]
    UInt32 = 6,
    #[display("i64")]
    Int64 = 7,
    #[display("u64")]
    UInt64 = 8,

    #[display("f16")]
    Float16 = 9,
    #[display("bf16")]
    BFloat16 = 10,
    #[display("f32")]
    Float32 = 11,
    #[display("f64")]
    Float64 = 12,
}

impl DType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub const fn bitwidth(&self) -> usize {
        self.bytes() * 8
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64) || self.is_float()
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }

    /// Real-valued types, the only ones transcendental ops and gradients accept.
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    pub const fn c_style(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "signed char",
            Self::Int16 => "short",
            Self::Int32 => "int",
            Self::Int64 => "long",
            Self::UInt8 => "unsigned char",
            Self::UInt16 => "unsigned short",
            Self::UInt32 => "unsigned int",
            Self::UInt64 => "unsigned long",
            Self::Float16 => "half",
            Self::BFloat16 => "__bf16",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }
}
