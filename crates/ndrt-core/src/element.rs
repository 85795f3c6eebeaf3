//! Statically typed element access.
//!
//! Array storage is untyped bytes tagged with a runtime [`DataType`]. The
//! [`Element`] trait connects a Rust type to its tag and knows how to move a
//! value in and out of those bytes. The `dispatch_numeric!` macro performs the
//! runtime-tag to static-type dispatch used by the bulk operations.

use crate::error::{NdError, NdResult};
use crate::types::{DataType, Scalar};
use half::{bf16, f16};

/// A Rust type that can be stored in an NDArray.
pub trait Element: Copy + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Decode one value; `bytes` holds exactly `size_of_element` bytes.
    fn read_from(bytes: &[u8]) -> Self;

    /// Encode one value into exactly `size_of_element` bytes.
    fn write_to(self, bytes: &mut [u8]);

    fn to_scalar(self) -> Scalar;

    fn from_scalar(value: Scalar) -> Self;
}

macro_rules! pod_element {
    ($t:ty, $dtype:ident, $variant:ident, $conv:ident, $wide:ty) => {
        impl Element for $t {
            const DATA_TYPE: DataType = DataType::$dtype;

            #[inline]
            fn read_from(bytes: &[u8]) -> Self {
                bytemuck::pod_read_unaligned(bytes)
            }

            #[inline]
            fn write_to(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(bytemuck::bytes_of(&self));
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::$variant(self as $wide)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                value.$conv() as $t
            }
        }
    };
}

pod_element!(i8, Int8, Int, to_i64, i64);
pod_element!(i16, Int16, Int, to_i64, i64);
pod_element!(i32, Int32, Int, to_i64, i64);
pod_element!(i64, Int64, Int, to_i64, i64);
pod_element!(u8, UInt8, UInt, to_u64, u64);
pod_element!(u16, UInt16, UInt, to_u64, u64);
pod_element!(u32, UInt32, UInt, to_u64, u64);
pod_element!(u64, UInt64, UInt, to_u64, u64);
pod_element!(f32, Float32, Float, to_f64, f64);
pod_element!(f64, Double, Float, to_f64, f64);

impl Element for f16 {
    const DATA_TYPE: DataType = DataType::Half;

    fn read_from(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }

    fn write_to(self, bytes: &mut [u8]) {
        bytes.copy_from_slice(bytemuck::bytes_of(&self));
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(self.to_f64())
    }

    fn from_scalar(value: Scalar) -> Self {
        f16::from_f64(value.to_f64())
    }
}

impl Element for bf16 {
    const DATA_TYPE: DataType = DataType::BFloat16;

    fn read_from(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }

    fn write_to(self, bytes: &mut [u8]) {
        bytes.copy_from_slice(bytemuck::bytes_of(&self));
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(self.to_f64())
    }

    fn from_scalar(value: Scalar) -> Self {
        bf16::from_f64(value.to_f64())
    }
}

// bool is not Pod: any non-zero byte reads as true.
impl Element for bool {
    const DATA_TYPE: DataType = DataType::Bool;

    fn read_from(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write_to(self, bytes: &mut [u8]) {
        bytes[0] = u8::from(self);
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    fn from_scalar(value: Scalar) -> Self {
        value.to_bool()
    }
}

/// Run `$body` with `$T` bound to the Rust type of a numeric [`DataType`].
///
/// String types evaluate `$strings` instead.
macro_rules! dispatch_numeric {
    ($dtype:expr, $T:ident => $body:expr, strings => $strings:expr) => {
        match $dtype {
            $crate::DataType::Bool => {
                type $T = bool;
                $body
            }
            $crate::DataType::Half => {
                type $T = ::half::f16;
                $body
            }
            $crate::DataType::BFloat16 => {
                type $T = ::half::bf16;
                $body
            }
            $crate::DataType::Float32 => {
                type $T = f32;
                $body
            }
            $crate::DataType::Double => {
                type $T = f64;
                $body
            }
            $crate::DataType::Int8 => {
                type $T = i8;
                $body
            }
            $crate::DataType::Int16 => {
                type $T = i16;
                $body
            }
            $crate::DataType::Int32 => {
                type $T = i32;
                $body
            }
            $crate::DataType::Int64 => {
                type $T = i64;
                $body
            }
            $crate::DataType::UInt8 => {
                type $T = u8;
                $body
            }
            $crate::DataType::UInt16 => {
                type $T = u16;
                $body
            }
            $crate::DataType::UInt32 => {
                type $T = u32;
                $body
            }
            $crate::DataType::UInt64 => {
                type $T = u64;
                $body
            }
            $crate::DataType::Utf8 | $crate::DataType::Utf16 | $crate::DataType::Utf32 => $strings,
        }
    };
}

/// Decode one element of runtime type `dtype` from `bytes`.
pub(crate) fn read_scalar(dtype: DataType, bytes: &[u8]) -> NdResult<Scalar> {
    dispatch_numeric!(dtype, T => Ok(<T as Element>::read_from(bytes).to_scalar()),
        strings => Err(NdError::unsupported("read_scalar", dtype)))
}

/// Encode `value` as one element of runtime type `dtype` into `bytes`.
pub(crate) fn write_scalar(dtype: DataType, bytes: &mut [u8], value: Scalar) -> NdResult<()> {
    dispatch_numeric!(dtype, T => {
        <T as Element>::from_scalar(value).write_to(bytes);
        Ok(())
    }, strings => Err(NdError::unsupported("write_scalar", dtype)))
}
