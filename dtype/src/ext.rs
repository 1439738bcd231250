//! Host scalar types and the element types that store them.

use super::*;

/// A Rust primitive usable as a tensor element.
pub trait HasDType: Copy + 'static {
    const DTYPE: DType;
}

impl DType {
    /// Element type storing `T`.
    pub const fn of<T: HasDType>() -> Self {
        T::DTYPE
    }
}

macro_rules! host_scalars {
    ($($ty:ty: $dtype:ident),* $(,)?) => {
        $(
            impl HasDType for $ty {
                const DTYPE: DType = DType::$dtype;
            }
            const _: () = assert!(DType::$dtype.bytes() == size_of::<$ty>());
        )*
    };
}

host_scalars! {
    bool: Bool,
    i8: Int8, i16: Int16, i32: Int32, i64: Int64,
    u8: UInt8, u16: UInt16, u32: UInt32, u64: UInt64,
    f32: Float32, f64: Float64,
}
