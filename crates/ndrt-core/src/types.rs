//! Core type definitions shared by every NDArray component.
//!
//! This module defines the small value types the runtime is built on:
//!
//! - The extents/strides container ([`Shape`])
//! - Memory layout order ([`Order`])
//! - Runtime element type tags ([`DataType`]) and array kinds ([`ArrayKind`])
//! - A dynamically typed element value ([`Scalar`]) used by conversions and reference kernels
//!
//! # Examples
//!
//! ```
//! use ndrt_core::{DataType, Order, Scalar};
//!
//! assert_eq!(DataType::Float32.size_of_element(), 4);
//! assert!(DataType::BFloat16.is_r());
//! assert_eq!(Order::from_char('f'), Some(Order::F));
//! assert_eq!(Scalar::from(2.5f64).to_i64(), 2);
//! ```

use smallvec::SmallVec;
use std::fmt;

/// Extents or strides of an array.
///
/// Optimized for arrays with up to 6 dimensions; higher ranks spill to the heap.
///
/// # Examples
///
/// ```
/// use ndrt_core::Shape;
/// use smallvec::smallvec;
///
/// let shape: Shape = smallvec![2, 3, 4];
/// assert_eq!(shape.len(), 3);
/// assert!(!shape.spilled());
/// ```
pub type Shape = SmallVec<[usize; 6]>;

/// Largest supported rank.
pub const MAX_RANK: usize = 32;

/// Memory layout order of an array
///
/// `C` is row-major (last axis varies fastest), `F` is column-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Order {
    #[default]
    C,
    F,
}

impl Order {
    pub fn as_char(self) -> char {
        match self {
            Order::C => 'c',
            Order::F => 'f',
        }
    }

    /// Parse a layout character, case insensitive.
    pub fn from_char(c: char) -> Option<Order> {
        match c {
            'c' | 'C' => Some(Order::C),
            'f' | 'F' => Some(Order::F),
            _ => None,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Runtime element type tag
///
/// Numeric codes match the values stored in the `extra` field of an encoded
/// shape description, see [`crate::shape::encode_shape_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Bool,
    Half,
    Float32,
    Double,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    BFloat16,
    Utf8,
    Utf16,
    Utf32,
}

impl DataType {
    /// All supported data types, in code order.
    pub const ALL: [DataType; 16] = [
        DataType::Bool,
        DataType::Half,
        DataType::Float32,
        DataType::Double,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::BFloat16,
        DataType::Utf8,
        DataType::Utf16,
        DataType::Utf32,
    ];

    /// Width of one element in bytes.
    ///
    /// For string types this is the width of one code unit.
    pub fn size_of_element(self) -> usize {
        match self {
            DataType::Bool | DataType::Int8 | DataType::UInt8 | DataType::Utf8 => 1,
            DataType::Half
            | DataType::BFloat16
            | DataType::Int16
            | DataType::UInt16
            | DataType::Utf16 => 2,
            DataType::Float32 | DataType::Int32 | DataType::UInt32 | DataType::Utf32 => 4,
            DataType::Double | DataType::Int64 | DataType::UInt64 => 8,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DataType::Bool => 1,
            DataType::Half => 3,
            DataType::Float32 => 5,
            DataType::Double => 6,
            DataType::Int8 => 7,
            DataType::Int16 => 8,
            DataType::Int32 => 9,
            DataType::Int64 => 10,
            DataType::UInt8 => 11,
            DataType::UInt16 => 12,
            DataType::UInt32 => 13,
            DataType::UInt64 => 14,
            DataType::BFloat16 => 17,
            DataType::Utf8 => 50,
            DataType::Utf16 => 51,
            DataType::Utf32 => 52,
        }
    }

    pub fn from_code(code: u8) -> Option<DataType> {
        DataType::ALL.into_iter().find(|dt| dt.code() == code)
    }

    /// Floating point type.
    pub fn is_r(self) -> bool {
        matches!(
            self,
            DataType::Half | DataType::BFloat16 | DataType::Float32 | DataType::Double
        )
    }

    /// Integer type, signed or unsigned.
    pub fn is_z(self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    pub fn is_b(self) -> bool {
        self == DataType::Bool
    }

    /// String type.
    pub fn is_s(self) -> bool {
        matches!(self, DataType::Utf8 | DataType::Utf16 | DataType::Utf32)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        )
    }

    pub fn is_numeric(self) -> bool {
        !self.is_s()
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Half => "HALF",
            DataType::Float32 => "FLOAT32",
            DataType::Double => "DOUBLE",
            DataType::Int8 => "INT8",
            DataType::Int16 => "INT16",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::UInt8 => "UINT8",
            DataType::UInt16 => "UINT16",
            DataType::UInt32 => "UINT32",
            DataType::UInt64 => "UINT64",
            DataType::BFloat16 => "BFLOAT16",
            DataType::Utf8 => "UTF8",
            DataType::Utf16 => "UTF16",
            DataType::Utf32 => "UTF32",
        }
    }

    /// Result type of a pairwise arithmetic operation on two operands.
    ///
    /// Floating point wins over integer, integer wins over bool, and within
    /// a family the wider type wins. Ties keep the left operand's type.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::DataType;
    ///
    /// assert_eq!(DataType::pick_pairwise(DataType::Int32, DataType::Float32), DataType::Float32);
    /// assert_eq!(DataType::pick_pairwise(DataType::Int8, DataType::Int64), DataType::Int64);
    /// assert_eq!(DataType::pick_pairwise(DataType::Bool, DataType::UInt8), DataType::UInt8);
    /// ```
    pub fn pick_pairwise(left: DataType, right: DataType) -> DataType {
        if left == right || right.is_s() {
            return left;
        }
        if left.is_s() {
            return right;
        }
        let rank = |dt: DataType| -> u8 {
            if dt.is_r() {
                2
            } else if dt.is_z() {
                1
            } else {
                0
            }
        };
        match rank(left).cmp(&rank(right)) {
            std::cmp::Ordering::Greater => left,
            std::cmp::Ordering::Less => right,
            std::cmp::Ordering::Equal => {
                if right.size_of_element() > left.size_of_element() {
                    right
                } else {
                    left
                }
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind flag carried by every shape descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayKind {
    #[default]
    Ordinary,
    /// Rank 0, exactly one element
    Scalar,
    /// No elements at all
    Empty,
}

impl ArrayKind {
    pub(crate) fn bits(self) -> i64 {
        match self {
            ArrayKind::Ordinary => 0,
            ArrayKind::Scalar => 1,
            ArrayKind::Empty => 2,
        }
    }

    pub(crate) fn from_bits(bits: i64) -> Option<ArrayKind> {
        match bits {
            0 => Some(ArrayKind::Ordinary),
            1 => Some(ArrayKind::Scalar),
            2 => Some(ArrayKind::Empty),
            _ => None,
        }
    }
}

/// A single element value with its numeric family erased
///
/// Conversions between families follow `as` cast semantics: floats truncate
/// toward zero when converted to integers and saturate at the integer bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    pub fn to_f64(self) -> f64 {
        match self {
            Scalar::Bool(b) => f64::from(u8::from(b)),
            Scalar::Int(v) => v as f64,
            Scalar::UInt(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    pub fn to_i64(self) -> i64 {
        match self {
            Scalar::Bool(b) => i64::from(b),
            Scalar::Int(v) => v,
            Scalar::UInt(v) => v as i64,
            Scalar::Float(v) => v as i64,
        }
    }

    pub fn to_u64(self) -> u64 {
        match self {
            Scalar::Bool(b) => u64::from(b),
            Scalar::Int(v) => v as u64,
            Scalar::UInt(v) => v,
            Scalar::Float(v) => v as u64,
        }
    }

    pub fn to_bool(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::UInt(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
        }
    }

    /// The widest data type of this value's family.
    pub fn data_type(self) -> DataType {
        match self {
            Scalar::Bool(_) => DataType::Bool,
            Scalar::Int(_) => DataType::Int64,
            Scalar::UInt(_) => DataType::UInt64,
            Scalar::Float(_) => DataType::Double,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Scalar::Float(_))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! scalar_from {
    ($variant:ident, $wide:ty, $($t:ty),*) => {
        $(
            impl From<$t> for Scalar {
                fn from(value: $t) -> Self {
                    Scalar::$variant(<$wide>::from(value))
                }
            }
        )*
    };
}

scalar_from!(Int, i64, i8, i16, i32, i64);
scalar_from!(UInt, u64, u8, u16, u32, u64);
scalar_from!(Float, f64, f32, f64);

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<half::f16> for Scalar {
    fn from(value: half::f16) -> Self {
        Scalar::Float(value.to_f64())
    }
}

impl From<half::bf16> for Scalar {
    fn from(value: half::bf16) -> Self {
        Scalar::Float(value.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_code(dt.code()), Some(dt));
        }
        assert_eq!(DataType::from_code(0), None);
    }

    #[test]
    fn test_families() {
        assert!(DataType::Half.is_r());
        assert!(DataType::UInt16.is_z());
        assert!(DataType::UInt16.is_unsigned());
        assert!(!DataType::Int16.is_unsigned());
        assert!(DataType::Utf16.is_s());
        assert!(!DataType::Utf16.is_numeric());
        assert!(DataType::Bool.is_b());
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(Scalar::Float(-2.7).to_i64(), -2);
        assert_eq!(Scalar::Float(1e30).to_i64(), i64::MAX);
        assert!(Scalar::Int(3).to_bool());
        assert!(!Scalar::Float(0.0).to_bool());
        assert_eq!(Scalar::Bool(true).to_f64(), 1.0);
        assert_eq!(Scalar::from(7u8), Scalar::UInt(7));
        assert_eq!(Scalar::from(-7i16), Scalar::Int(-7));
    }

    #[test]
    fn test_order_chars() {
        assert_eq!(Order::C.as_char(), 'c');
        assert_eq!(Order::from_char('F'), Some(Order::F));
        assert_eq!(Order::from_char('x'), None);
        assert_eq!(Order::default(), Order::C);
    }

    #[test]
    fn test_pick_pairwise_float_wins() {
        assert_eq!(
            DataType::pick_pairwise(DataType::Double, DataType::Int64),
            DataType::Double
        );
        assert_eq!(
            DataType::pick_pairwise(DataType::Half, DataType::Float32),
            DataType::Float32
        );
        assert_eq!(
            DataType::pick_pairwise(DataType::Int32, DataType::UInt32),
            DataType::Int32
        );
    }
}
