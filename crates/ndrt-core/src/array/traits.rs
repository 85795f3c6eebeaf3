//! Standard trait implementations for `NDArray`.
//!
//! The arithmetic operators panic where the `try_*` methods would return an
//! error; use those when shapes are not known to be compatible.

use crate::array::NDArray;
use crate::broadcast::ArithmeticOp;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $array_fn:ident, $scalar_fn:ident) => {
        impl $trait<&NDArray> for &NDArray {
            type Output = NDArray;

            fn $method(self, rhs: &NDArray) -> NDArray {
                self.$array_fn(rhs)
                    .expect(concat!("NDArray ", stringify!($method), " failed"))
            }
        }

        impl $trait<f64> for &NDArray {
            type Output = NDArray;

            fn $method(self, rhs: f64) -> NDArray {
                self.$scalar_fn(rhs)
                    .expect(concat!("NDArray ", stringify!($method), " failed"))
            }
        }
    };
}

binary_operator!(Add, add, try_add, add_scalar);
binary_operator!(Sub, sub, try_sub, sub_scalar);
binary_operator!(Mul, mul, try_mul, mul_scalar);
binary_operator!(Div, div, try_div, div_scalar);

macro_rules! assign_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&NDArray> for NDArray {
            fn $method(&mut self, rhs: &NDArray) {
                let applied = self
                    .apply_broadcast_in_place($op, rhs)
                    .expect(concat!("NDArray ", stringify!($method), " failed"));
                assert!(applied, "shapes {:?} and {:?} are not broadcastable", self.shape(), rhs.shape());
            }
        }

        impl $trait<f64> for NDArray {
            fn $method(&mut self, rhs: f64) {
                let scalar = NDArray::scalar_of(self.context(), rhs, self.data_type())
                    .expect("scalar operand");
                self.$method(&scalar);
            }
        }
    };
}

assign_operator!(AddAssign, add_assign, ArithmeticOp::Add);
assign_operator!(SubAssign, sub_assign, ArithmeticOp::Subtract);
assign_operator!(MulAssign, mul_assign, ArithmeticOp::Multiply);
assign_operator!(DivAssign, div_assign, ArithmeticOp::Divide);

impl Neg for &NDArray {
    type Output = NDArray;

    fn neg(self) -> NDArray {
        self.rsub_scalar(0).expect("NDArray neg failed")
    }
}

/// Deep copy into a fresh buffer, preserving the ordering.
impl Clone for NDArray {
    fn clone(&self) -> Self {
        self.dup(None).expect("failed to duplicate array")
    }
}

impl fmt::Debug for NDArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NDArray")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("dtype", &self.data_type())
            .field("order", &self.ordering())
            .field("offset", &self.buffer_offset())
            .field("is_view", &self.is_view())
            .finish()
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, shape: &[usize], items: &[String]) -> fmt::Result {
    match shape.split_first() {
        None => f.write_str(&items[0]),
        Some((&extent, rest)) => {
            let chunk: usize = rest.iter().product();
            f.write_str("[")?;
            for i in 0..extent {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_nested(f, rest, &items[i * chunk..(i + 1) * chunk])?;
            }
            f.write_str("]")
        }
    }
}

impl fmt::Display for NDArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("[]");
        }
        let items: Vec<String> = if self.is_s() {
            self.strings()
                .map_err(|_| fmt::Error)?
                .iter()
                .map(|s| format!("{s:?}"))
                .collect()
        } else {
            self.to_scalars()
                .map_err(|_| fmt::Error)?
                .iter()
                .map(ToString::to_string)
                .collect()
        };
        write_nested(f, self.shape(), &items)
    }
}

/// Equal shapes and types, with floats compared within `1e-5`.
impl PartialEq for NDArray {
    fn eq(&self, other: &Self) -> bool {
        self.equals_to(other, 1e-5)
    }
}
