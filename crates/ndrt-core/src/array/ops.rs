//! Arithmetic and comparison between arrays, backed by broadcast dispatch.
//!
//! Every method allocates its result in the context of `self`. Shapes that are
//! neither equal nor broadcastable yield `Ok(None)` from the `apply_*`
//! methods and a [`NdError::ShapeMismatch`] from the named shortcuts.

use crate::array::NDArray;
use crate::broadcast::{
    broadcast_apply, warn_incompatible, ArithmeticOp, BoolOp, BroadcastOp, BroadcastOutcome,
};
use crate::error::{NdError, NdResult};
use crate::shape::broadcast_shapes;
use crate::types::{Scalar, Shape};

impl NDArray {
    /// Compute `self op other` into a freshly allocated array.
    ///
    /// The result type is the op's result type for the two input types and
    /// the result keeps the ordering of `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{ArithmeticOp, LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let m = NDArray::from_vec(&ctx, &[2, 2], vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
    /// let col = NDArray::from_vec(&ctx, &[2, 1], vec![10.0f64, 20.0]).unwrap();
    ///
    /// let sum = m.apply_broadcast(ArithmeticOp::Add, &col).unwrap().unwrap();
    /// assert_eq!(sum.to_vec::<f64>().unwrap(), vec![11.0, 12.0, 23.0, 24.0]);
    ///
    /// let row = NDArray::from_vec(&ctx, &[3], vec![1.0f64, 2.0, 3.0]).unwrap();
    /// assert!(m.apply_broadcast(ArithmeticOp::Add, &row).unwrap().is_none());
    /// ```
    pub fn apply_broadcast(
        &self,
        op: impl Into<BroadcastOp>,
        other: &NDArray,
    ) -> NdResult<Option<NDArray>> {
        let op = op.into();
        let dtype = op.result_type(self.dtype, other.dtype);
        if self.is_empty() || other.is_empty() {
            return Ok(Some(NDArray::empty(&self.context, dtype)));
        }

        let target: Shape = match (self.is_scalar(), other.is_scalar()) {
            (true, false) => other.shape().into(),
            (false, true) => self.shape().into(),
            _ => match broadcast_shapes(self.shape(), other.shape()) {
                Some(shape) => shape,
                None => {
                    warn_incompatible(self, other);
                    return Ok(None);
                }
            },
        };
        let mut z = NDArray::new(&self.context, self.ordering(), &target, dtype)?;
        Ok(match broadcast_apply(op, self, other, &mut z)? {
            Some(BroadcastOutcome::Target) => Some(z),
            Some(BroadcastOutcome::Materialized(result)) => Some(result),
            None => None,
        })
    }

    /// Compute `self = self op other`, keeping the type and shape of `self`.
    ///
    /// Returns `Ok(false)` when the shapes are incompatible.
    ///
    /// # Errors
    ///
    /// [`NdError::ShapeMismatch`] when the broadcast result would not have the
    /// shape of `self`.
    pub fn apply_broadcast_in_place(
        &mut self,
        op: impl Into<BroadcastOp>,
        other: &NDArray,
    ) -> NdResult<bool> {
        let x = self.view();
        match broadcast_apply(op.into(), &x, other, self)? {
            None => Ok(false),
            Some(BroadcastOutcome::Target) => Ok(true),
            Some(BroadcastOutcome::Materialized(result)) => {
                self.assign(&result)?;
                Ok(true)
            }
        }
    }

    fn binary(&self, op: ArithmeticOp, other: &NDArray, name: &str) -> NdResult<NDArray> {
        self.apply_broadcast(op, other)?
            .ok_or_else(|| NdError::shape_mismatch(name, self.shape(), other.shape()))
    }

    fn with_scalar(&self, op: ArithmeticOp, value: impl Into<Scalar>, name: &str) -> NdResult<NDArray> {
        let scalar = NDArray::scalar_of(&self.context, value, self.dtype)?;
        self.binary(op, &scalar, name)
    }

    /// `self + other` with broadcasting.
    pub fn try_add(&self, other: &NDArray) -> NdResult<NDArray> {
        self.binary(ArithmeticOp::Add, other, "add")
    }

    /// `self - other` with broadcasting.
    pub fn try_sub(&self, other: &NDArray) -> NdResult<NDArray> {
        self.binary(ArithmeticOp::Subtract, other, "sub")
    }

    /// `self * other` with broadcasting.
    pub fn try_mul(&self, other: &NDArray) -> NdResult<NDArray> {
        self.binary(ArithmeticOp::Multiply, other, "mul")
    }

    /// `self / other` with broadcasting. Integer division by zero yields 0.
    pub fn try_div(&self, other: &NDArray) -> NdResult<NDArray> {
        self.binary(ArithmeticOp::Divide, other, "div")
    }

    pub fn add_scalar(&self, value: impl Into<Scalar>) -> NdResult<NDArray> {
        self.with_scalar(ArithmeticOp::Add, value, "add_scalar")
    }

    pub fn sub_scalar(&self, value: impl Into<Scalar>) -> NdResult<NDArray> {
        self.with_scalar(ArithmeticOp::Subtract, value, "sub_scalar")
    }

    pub fn mul_scalar(&self, value: impl Into<Scalar>) -> NdResult<NDArray> {
        self.with_scalar(ArithmeticOp::Multiply, value, "mul_scalar")
    }

    pub fn div_scalar(&self, value: impl Into<Scalar>) -> NdResult<NDArray> {
        self.with_scalar(ArithmeticOp::Divide, value, "div_scalar")
    }

    /// `value - self`
    pub fn rsub_scalar(&self, value: impl Into<Scalar>) -> NdResult<NDArray> {
        self.with_scalar(ArithmeticOp::ReverseSubtract, value, "rsub_scalar")
    }

    /// `value / self`
    pub fn rdiv_scalar(&self, value: impl Into<Scalar>) -> NdResult<NDArray> {
        self.with_scalar(ArithmeticOp::ReverseDivide, value, "rdiv_scalar")
    }

    /// Add `row` to every row of this matrix.
    ///
    /// # Errors
    ///
    /// [`NdError::RankMismatch`] unless `self` is a matrix, and
    /// [`NdError::ShapeMismatch`] unless `row` has one element per column.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let m = NDArray::from_vec(&ctx, &[2, 3], vec![0i32; 6]).unwrap();
    /// let row = NDArray::from_vec(&ctx, &[3], vec![1i32, 2, 3]).unwrap();
    ///
    /// let out = m.add_row_vector(&row).unwrap();
    /// assert_eq!(out.to_vec::<i32>().unwrap(), vec![1, 2, 3, 1, 2, 3]);
    /// ```
    pub fn add_row_vector(&self, row: &NDArray) -> NdResult<NDArray> {
        let columns = self.columns()?;
        if row.length_of() != columns {
            return Err(NdError::shape_mismatch("add_row_vector", self.shape(), row.shape()));
        }
        let row = row.reshape(row.ordering(), &[1, columns])?;
        self.binary(ArithmeticOp::Add, &row, "add_row_vector")
    }

    /// Add `column` to every column of this matrix.
    pub fn add_column_vector(&self, column: &NDArray) -> NdResult<NDArray> {
        let rows = self.rows()?;
        if column.length_of() != rows {
            return Err(NdError::shape_mismatch(
                "add_column_vector",
                self.shape(),
                column.shape(),
            ));
        }
        let column = column.reshape(column.ordering(), &[rows, 1])?;
        self.binary(ArithmeticOp::Add, &column, "add_column_vector")
    }

    /// Element-wise comparison or logical op producing a `Bool` array.
    pub fn compare(&self, op: BoolOp, other: &NDArray) -> NdResult<NDArray> {
        self.apply_broadcast(op, other)?
            .ok_or_else(|| NdError::shape_mismatch("compare", self.shape(), other.shape()))
    }
}

#[cfg(test)]
mod tests {
    use crate::broadcast::{ArithmeticOp, BoolOp};
    use crate::error::NdError;
    use crate::types::{DataType, Order};
    use crate::{LaunchContext, NDArray};

    #[test]
    fn test_mixed_types_promote() {
        let ctx = LaunchContext::host();
        let a = NDArray::from_vec(&ctx, &[3], vec![1i32, 2, 3]).unwrap();
        let b = NDArray::from_vec(&ctx, &[3], vec![0.5f32, 0.5, 0.5]).unwrap();
        let c = a.try_add(&b).unwrap();
        assert_eq!(c.data_type(), DataType::Float32);
        assert_eq!(c.to_vec::<f32>().unwrap(), vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_scalar_shortcuts() {
        let ctx = LaunchContext::host();
        let a = NDArray::from_vec(&ctx, &[3], vec![2.0f64, 4.0, 8.0]).unwrap();
        assert_eq!(a.rsub_scalar(10.0).unwrap().to_vec::<f64>().unwrap(), vec![8.0, 6.0, 2.0]);
        assert_eq!(a.rdiv_scalar(8.0).unwrap().to_vec::<f64>().unwrap(), vec![4.0, 2.0, 1.0]);
        assert_eq!(a.mul_scalar(0.5).unwrap().to_vec::<f64>().unwrap(), vec![1.0, 2.0, 4.0]);
        assert_eq!(a.sub_scalar(1).unwrap().to_vec::<f64>().unwrap(), vec![1.0, 3.0, 7.0]);
        assert_eq!(a.div_scalar(2).unwrap().to_vec::<f64>().unwrap(), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_scalar_array_on_the_left() {
        let ctx = LaunchContext::host();
        let five = NDArray::scalar(&ctx, 5i32).unwrap();
        let v = NDArray::from_vec(&ctx, &[3], vec![1i32, 2, 3]).unwrap();
        let out = five.try_sub(&v).unwrap();
        assert_eq!(out.shape(), &[3]);
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![4, 3, 2]);
    }

    #[test]
    fn test_incompatible_shapes() {
        let ctx = LaunchContext::host();
        let a = NDArray::zeros(&ctx, &[2, 3], DataType::Float32).unwrap();
        let b = NDArray::zeros(&ctx, &[2], DataType::Float32).unwrap();
        assert!(a.apply_broadcast(ArithmeticOp::Add, &b).unwrap().is_none());
        assert!(matches!(a.try_mul(&b), Err(NdError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_row_and_column_helpers() {
        let ctx = LaunchContext::host();
        let m = NDArray::new(&ctx, Order::F, &[2, 2], DataType::Int64).unwrap();
        let col = NDArray::from_vec(&ctx, &[2], vec![1i64, 2]).unwrap();
        let out = m.add_column_vector(&col).unwrap();
        assert_eq!(out.to_vec::<i64>().unwrap(), vec![1, 1, 2, 2]);
        assert_eq!(out.ordering(), Order::F);

        let short = NDArray::from_vec(&ctx, &[3], vec![1i64, 2, 3]).unwrap();
        assert!(m.add_row_vector(&short).is_err());
        let v = NDArray::zeros(&ctx, &[4], DataType::Int64).unwrap();
        assert!(matches!(
            v.add_row_vector(&col),
            Err(NdError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_compare_yields_bool() {
        let ctx = LaunchContext::host();
        let a = NDArray::from_vec(&ctx, &[3], vec![1.0f32, f32::NAN, 3.0]).unwrap();
        let b = NDArray::from_vec(&ctx, &[3], vec![1.0f32, f32::NAN, 2.0]).unwrap();
        let eq = a.compare(BoolOp::EqualTo, &b).unwrap();
        assert_eq!(eq.data_type(), DataType::Bool);
        assert_eq!(eq.to_vec::<bool>().unwrap(), vec![true, false, false]);
    }

    #[test]
    fn test_in_place_keeps_type() {
        let ctx = LaunchContext::host();
        let mut a = NDArray::from_vec(&ctx, &[2, 2], vec![1u8, 2, 3, 4]).unwrap();
        let row = NDArray::from_vec(&ctx, &[2], vec![10u8, 20]).unwrap();
        assert!(a.apply_broadcast_in_place(ArithmeticOp::Add, &row).unwrap());
        assert_eq!(a.data_type(), DataType::UInt8);
        assert_eq!(a.to_vec::<u8>().unwrap(), vec![11, 22, 13, 24]);

        let wide = NDArray::zeros(&ctx, &[3, 2, 2], DataType::UInt8).unwrap();
        assert!(a.apply_broadcast_in_place(ArithmeticOp::Add, &wide).is_err());
        let bad = NDArray::zeros(&ctx, &[3], DataType::UInt8).unwrap();
        assert!(!a.apply_broadcast_in_place(ArithmeticOp::Add, &bad).unwrap());
    }

    #[test]
    fn test_empty_operand_gives_empty_result() {
        let ctx = LaunchContext::host();
        let e = NDArray::empty(&ctx, DataType::Float32);
        let a = NDArray::zeros(&ctx, &[2], DataType::Float32).unwrap();
        assert!(a.try_add(&e).unwrap().is_empty());
    }
}
