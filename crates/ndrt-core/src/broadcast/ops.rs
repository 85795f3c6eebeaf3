//! Element-wise binary operations in three families.
//!
//! Every operation works on [`Scalar`] values. Arithmetic and comparisons
//! run in `f64` when a floating point value or result type is involved and
//! in wrapping `i128` otherwise, so integer results match the wrap-around
//! behaviour of the stored type after casting.

use crate::types::{DataType, Scalar};

/// Arithmetic operations; the result has the promoted input type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// `y - x`
    ReverseSubtract,
    /// `y / x`
    ReverseDivide,
    Pow,
    /// `y ^ x`
    ReversePow,
    /// `(x - y)^2`
    SquaredSubtract,
    /// `(y - x)^2`
    SquaredReverseSubtract,
    Max,
    Min,
    /// Operand with the larger magnitude
    AMax,
    /// Operand with the smaller magnitude
    AMin,
    FloorDiv,
    /// Remainder with the sign of the divisor
    FloorMod,
    /// Takes `y`
    Copy,
    Atan2,
}

/// Comparisons and logical connectives; the result is always [`DataType::Bool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoolOp {
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    And,
    Or,
    Xor,
}

/// Bit operations on integer types.
///
/// Shift amounts are taken modulo the bit width of the computation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntOp {
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    CyclicShiftLeft,
    CyclicShiftRight,
}

/// A binary operation from any family.
///
/// # Examples
///
/// ```
/// use ndrt_core::{ArithmeticOp, BroadcastOp, DataType, Scalar};
///
/// let sub = BroadcastOp::Arithmetic(ArithmeticOp::Subtract);
/// let rsub = sub.reversed().unwrap();
/// let (a, b) = (Scalar::Int(5), Scalar::Int(2));
/// assert_eq!(sub.apply(a, b, DataType::Int32), rsub.apply(b, a, DataType::Int32));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BroadcastOp {
    Arithmetic(ArithmeticOp),
    Bool(BoolOp),
    Int(IntOp),
}

impl From<ArithmeticOp> for BroadcastOp {
    fn from(op: ArithmeticOp) -> Self {
        BroadcastOp::Arithmetic(op)
    }
}

impl From<BoolOp> for BroadcastOp {
    fn from(op: BoolOp) -> Self {
        BroadcastOp::Bool(op)
    }
}

impl From<IntOp> for BroadcastOp {
    fn from(op: IntOp) -> Self {
        BroadcastOp::Int(op)
    }
}

impl BroadcastOp {
    /// `op(x, y) == op(y, x)` for all operands.
    pub fn is_commutative(self) -> bool {
        use ArithmeticOp as A;
        match self {
            BroadcastOp::Arithmetic(op) => {
                matches!(op, A::Add | A::Multiply | A::Max | A::Min | A::AMax | A::AMin)
            }
            BroadcastOp::Bool(op) => matches!(
                op,
                BoolOp::EqualTo | BoolOp::NotEqualTo | BoolOp::And | BoolOp::Or | BoolOp::Xor
            ),
            BroadcastOp::Int(op) => {
                matches!(op, IntOp::BitwiseAnd | IntOp::BitwiseOr | IntOp::BitwiseXor)
            }
        }
    }

    /// The operation `r` with `r(y, x) == self(x, y)`, if one exists.
    ///
    /// Commutative operations are their own reversal.
    pub fn reversed(self) -> Option<BroadcastOp> {
        use ArithmeticOp as A;
        if self.is_commutative() {
            return Some(self);
        }
        let reversed = match self {
            BroadcastOp::Arithmetic(op) => BroadcastOp::Arithmetic(match op {
                A::Subtract => A::ReverseSubtract,
                A::ReverseSubtract => A::Subtract,
                A::Divide => A::ReverseDivide,
                A::ReverseDivide => A::Divide,
                A::Pow => A::ReversePow,
                A::ReversePow => A::Pow,
                A::SquaredSubtract => A::SquaredReverseSubtract,
                A::SquaredReverseSubtract => A::SquaredSubtract,
                _ => return None,
            }),
            BroadcastOp::Bool(op) => BroadcastOp::Bool(match op {
                BoolOp::GreaterThan => BoolOp::LessThan,
                BoolOp::LessThan => BoolOp::GreaterThan,
                BoolOp::GreaterThanOrEqual => BoolOp::LessThanOrEqual,
                BoolOp::LessThanOrEqual => BoolOp::GreaterThanOrEqual,
                _ => return None,
            }),
            BroadcastOp::Int(_) => return None,
        };
        Some(reversed)
    }

    /// Data type of `x op y`.
    pub fn result_type(self, x: DataType, y: DataType) -> DataType {
        match self {
            BroadcastOp::Bool(_) => DataType::Bool,
            _ => DataType::pick_pairwise(x, y),
        }
    }

    /// Apply to one pair of values; `dtype` is the type the result is stored as.
    pub fn apply(self, x: Scalar, y: Scalar, dtype: DataType) -> Scalar {
        match self {
            BroadcastOp::Arithmetic(op) => {
                if dtype.is_r() || x.is_float() || y.is_float() {
                    Scalar::Float(arithmetic_f64(op, x.to_f64(), y.to_f64()))
                } else {
                    let wide = arithmetic_i128(op, wide_int(x), wide_int(y));
                    if dtype.is_unsigned() {
                        Scalar::UInt(wide as u64)
                    } else {
                        Scalar::Int(wide as i64)
                    }
                }
            }
            BroadcastOp::Bool(op) => Scalar::Bool(compare(op, x, y)),
            BroadcastOp::Int(op) => bitwise(op, x, y, dtype),
        }
    }
}

fn wide_int(value: Scalar) -> i128 {
    match value {
        Scalar::UInt(u) => i128::from(u),
        other => i128::from(other.to_i64()),
    }
}

fn arithmetic_f64(op: ArithmeticOp, x: f64, y: f64) -> f64 {
    use ArithmeticOp as A;
    match op {
        A::Add => x + y,
        A::Subtract => x - y,
        A::Multiply => x * y,
        A::Divide => x / y,
        A::ReverseSubtract => y - x,
        A::ReverseDivide => y / x,
        A::Pow => x.powf(y),
        A::ReversePow => y.powf(x),
        A::SquaredSubtract => (x - y) * (x - y),
        A::SquaredReverseSubtract => (y - x) * (y - x),
        A::Max => x.max(y),
        A::Min => x.min(y),
        A::AMax => {
            if x.abs() >= y.abs() {
                x
            } else {
                y
            }
        }
        A::AMin => {
            if x.abs() <= y.abs() {
                x
            } else {
                y
            }
        }
        A::FloorDiv => (x / y).floor(),
        A::FloorMod => x - (x / y).floor() * y,
        A::Copy => y,
        A::Atan2 => x.atan2(y),
    }
}

fn int_pow(base: i128, exp: i128) -> i128 {
    match (base, exp) {
        (_, e) if e >= 0 => base.wrapping_pow(u32::try_from(e).unwrap_or(u32::MAX)),
        (1, _) => 1,
        (-1, e) => {
            if e % 2 == 0 {
                1
            } else {
                -1
            }
        }
        _ => 0,
    }
}

fn floor_div(x: i128, y: i128) -> i128 {
    if y == 0 {
        return 0;
    }
    let q = x.wrapping_div(y);
    if (x % y != 0) && ((x < 0) != (y < 0)) {
        q - 1
    } else {
        q
    }
}

// integer division by zero yields zero instead of trapping
fn arithmetic_i128(op: ArithmeticOp, x: i128, y: i128) -> i128 {
    use ArithmeticOp as A;
    let div = |a: i128, b: i128| if b == 0 { 0 } else { a.wrapping_div(b) };
    match op {
        A::Add => x.wrapping_add(y),
        A::Subtract => x.wrapping_sub(y),
        A::Multiply => x.wrapping_mul(y),
        A::Divide => div(x, y),
        A::ReverseSubtract => y.wrapping_sub(x),
        A::ReverseDivide => div(y, x),
        A::Pow => int_pow(x, y),
        A::ReversePow => int_pow(y, x),
        A::SquaredSubtract | A::SquaredReverseSubtract => {
            let d = x.wrapping_sub(y);
            d.wrapping_mul(d)
        }
        A::Max => x.max(y),
        A::Min => x.min(y),
        A::AMax => {
            if x.abs() >= y.abs() {
                x
            } else {
                y
            }
        }
        A::AMin => {
            if x.abs() <= y.abs() {
                x
            } else {
                y
            }
        }
        A::FloorDiv => floor_div(x, y),
        A::FloorMod => {
            if y == 0 {
                0
            } else {
                x - floor_div(x, y) * y
            }
        }
        A::Copy => y,
        A::Atan2 => (x as f64).atan2(y as f64) as i128,
    }
}

fn compare(op: BoolOp, x: Scalar, y: Scalar) -> bool {
    use std::cmp::Ordering;
    let ordering = if x.is_float() || y.is_float() {
        x.to_f64().partial_cmp(&y.to_f64())
    } else {
        Some(wide_int(x).cmp(&wide_int(y)))
    };
    match op {
        BoolOp::EqualTo => ordering == Some(Ordering::Equal),
        BoolOp::NotEqualTo => ordering != Some(Ordering::Equal),
        BoolOp::GreaterThan => ordering == Some(Ordering::Greater),
        BoolOp::GreaterThanOrEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        BoolOp::LessThan => ordering == Some(Ordering::Less),
        BoolOp::LessThanOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        BoolOp::And => x.to_bool() && y.to_bool(),
        BoolOp::Or => x.to_bool() || y.to_bool(),
        BoolOp::Xor => x.to_bool() != y.to_bool(),
    }
}

fn bitwise(op: IntOp, x: Scalar, y: Scalar, dtype: DataType) -> Scalar {
    let bits = (dtype.size_of_element() * 8).clamp(8, 64) as u32;
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let a = x.to_u64() & mask;
    let b = y.to_u64() & mask;
    let shift = (y.to_u64() % u64::from(bits)) as u32;
    let raw = match op {
        IntOp::BitwiseAnd => a & b,
        IntOp::BitwiseOr => a | b,
        IntOp::BitwiseXor => a ^ b,
        IntOp::ShiftLeft => a << shift,
        IntOp::ShiftRight => {
            if dtype.is_unsigned() {
                a >> shift
            } else {
                // arithmetic shift within the type's width
                let signed = ((a << (64 - bits)) as i64) >> (64 - bits);
                (signed >> shift) as u64
            }
        }
        IntOp::CyclicShiftLeft => {
            if shift == 0 {
                a
            } else {
                (a << shift) | (a >> (bits - shift))
            }
        }
        IntOp::CyclicShiftRight => {
            if shift == 0 {
                a
            } else {
                (a >> shift) | (a << (bits - shift))
            }
        }
    } & mask;
    if dtype.is_unsigned() {
        Scalar::UInt(raw)
    } else {
        // sign-extend from the type's width
        Scalar::Int(((raw << (64 - bits)) as i64) >> (64 - bits))
    }
}
