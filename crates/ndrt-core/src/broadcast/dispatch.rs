//! Choosing between pairwise, scalar and true-broadcast execution.

use crate::array::NDArray;
use crate::broadcast::{BroadcastKernels, BroadcastOp, HostKernels};
use crate::error::{NdError, NdResult};
use crate::shape::broadcast_shapes;
use crate::tad::complement_dims;
use crate::types::Shape;

/// Where the result of a successful dispatch lives.
#[derive(Debug)]
pub enum BroadcastOutcome {
    /// Written into the caller's output array
    Target,
    /// A scalar-on-the-left operation whose output was not shaped like the
    /// array operand; the result was computed into this fresh array instead
    Materialized(NDArray),
}

pub(crate) fn warn_incompatible(x: &NDArray, y: &NDArray) {
    tracing::warn!(
        x = ?x.shape(),
        y = ?y.shape(),
        "broadcast: shapes should be equal or broadcastable"
    );
}

/// Compute `z = x op y` with the host kernels.
///
/// Returns `Ok(None)` when the shapes are neither equal nor broadcastable.
///
/// # Errors
///
/// - [`NdError::EmptyOutputRequired`] when an input is empty but `z` is not
/// - [`NdError::ShapeMismatch`] when `z` cannot hold the result
/// - [`NdError::Unsupported`] for string inputs or bit operations on
///   non-integer inputs
///
/// # Examples
///
/// ```
/// use ndrt_core::{broadcast_apply, ArithmeticOp, BroadcastOutcome, DataType, LaunchContext, NDArray};
///
/// let ctx = LaunchContext::host();
/// let x = NDArray::from_vec(&ctx, &[2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
/// let y = NDArray::from_vec(&ctx, &[3], vec![10i32, 20, 30]).unwrap();
/// let mut z = NDArray::zeros(&ctx, &[2, 3], DataType::Int32).unwrap();
///
/// let outcome = broadcast_apply(ArithmeticOp::Add.into(), &x, &y, &mut z).unwrap();
/// assert!(matches!(outcome, Some(BroadcastOutcome::Target)));
/// assert_eq!(z.to_vec::<i32>().unwrap(), vec![11, 22, 33, 14, 25, 36]);
///
/// let bad = NDArray::zeros(&ctx, &[4], DataType::Int32).unwrap();
/// assert!(broadcast_apply(ArithmeticOp::Add.into(), &x, &bad, &mut z).unwrap().is_none());
/// ```
pub fn broadcast_apply(
    op: BroadcastOp,
    x: &NDArray,
    y: &NDArray,
    z: &mut NDArray,
) -> NdResult<Option<BroadcastOutcome>> {
    broadcast_apply_with(&HostKernels, op, x, y, z)
}

/// [`broadcast_apply`] with caller-provided kernels.
pub fn broadcast_apply_with<K: BroadcastKernels + ?Sized>(
    kernels: &K,
    op: BroadcastOp,
    x: &NDArray,
    y: &NDArray,
    z: &mut NDArray,
) -> NdResult<Option<BroadcastOutcome>> {
    if x.is_empty() || y.is_empty() {
        if !z.is_empty() {
            return Err(NdError::EmptyOutputRequired {
                operation: "broadcast_apply".to_string(),
            });
        }
        return Ok(Some(BroadcastOutcome::Target));
    }
    for operand in [x, y] {
        if operand.is_s() {
            return Err(NdError::unsupported("broadcast_apply", operand.data_type()));
        }
        if matches!(op, BroadcastOp::Int(_)) && !operand.is_z() {
            return Err(NdError::unsupported(
                format!("broadcast_apply({op:?})"),
                operand.data_type(),
            ));
        }
    }

    match (x.is_scalar(), y.is_scalar()) {
        (false, false) if x.is_same_shape(y) => {
            tracing::debug!(?op, shape = ?x.shape(), "broadcast: pairwise");
            kernels.pairwise(op, x, y, z)?;
        }
        (false, true) => {
            tracing::debug!(?op, shape = ?x.shape(), "broadcast: array-scalar");
            kernels.scalar(op, x, y, z, false)?;
        }
        (true, false) => return scalar_on_left(kernels, op, x, y, z),
        (true, true) => {
            if z.length_of() != 1 {
                return Err(NdError::shape_mismatch("broadcast_apply", z.shape(), &[1]));
            }
            kernels.scalar(op, x, y, z, false)?;
        }
        (false, false) => return true_broadcast(kernels, op, x, y, z),
    }
    Ok(Some(BroadcastOutcome::Target))
}

fn scalar_on_left<K: BroadcastKernels + ?Sized>(
    kernels: &K,
    op: BroadcastOp,
    x: &NDArray,
    y: &NDArray,
    z: &mut NDArray,
) -> NdResult<Option<BroadcastOutcome>> {
    if !z.is_same_shape(y) {
        tracing::debug!(?op, shape = ?y.shape(), "broadcast: scalar-array into a temporary");
        let mut tz = NDArray::value_of(
            x.context(),
            y.shape(),
            x.get_scalar(0)?,
            z.data_type(),
        )?;
        let lhs = tz.view();
        kernels.pairwise(op, &lhs, y, &mut tz)?;
        return Ok(Some(BroadcastOutcome::Materialized(tz)));
    }

    match op.reversed() {
        Some(reversed) => {
            tracing::debug!(?op, ?reversed, "broadcast: scalar-array via reversed op");
            kernels.scalar(reversed, y, x, z, false)?;
        }
        None => {
            tracing::debug!(?op, "broadcast: scalar-array via fill and pairwise");
            z.assign(x)?;
            let lhs = z.view();
            kernels.pairwise(op, &lhs, y, z)?;
        }
    }
    Ok(Some(BroadcastOutcome::Target))
}

fn true_broadcast<K: BroadcastKernels + ?Sized>(
    kernels: &K,
    op: BroadcastOp,
    x: &NDArray,
    y: &NDArray,
    z: &mut NDArray,
) -> NdResult<Option<BroadcastOutcome>> {
    let Some(target) = broadcast_shapes(x.shape(), y.shape()) else {
        warn_incompatible(x, y);
        return Ok(None);
    };
    if z.shape() != target.as_slice() {
        return Err(NdError::shape_mismatch("broadcast_apply", z.shape(), &target));
    }

    let tiled;
    let (full, small, small_on_left) = if x.shape() == target.as_slice() {
        (x, y, false)
    } else if y.shape() == target.as_slice() {
        (y, x, true)
    } else {
        tiled = x.tile_to_shape(&target)?;
        (&tiled, y, false)
    };

    if small.length_of() == 1 {
        tracing::debug!(?op, target = ?target, "broadcast: unit operand as scalar");
        kernels.scalar(op, full, small, z, small_on_left)?;
        return Ok(Some(BroadcastOutcome::Target));
    }

    let rank = target.len();
    let padding = rank - small.rank_of();
    let spanned: Shape = (0..rank)
        .filter(|&d| {
            d >= padding && target[d] != 1 && small.shape()[d - padding] == target[d]
        })
        .collect();
    let excluded = complement_dims(rank, &spanned);
    let context = z.context().clone();
    let z_pack = context.tad_pack(z.descriptor(), &excluded, false)?;
    let full_pack = context.tad_pack(full.descriptor(), &excluded, false)?;
    tracing::debug!(
        ?op,
        target = ?target,
        tads = z_pack.number_of_tads(),
        "broadcast: true broadcast"
    );
    kernels.broadcast(op, full, small, z, &full_pack, &z_pack, small_on_left)?;
    Ok(Some(BroadcastOutcome::Target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{ArithmeticOp, BoolOp, IntOp};
    use crate::types::DataType;
    use crate::LaunchContext;
    use std::sync::Arc;

    fn ctx() -> Arc<crate::LaunchContext> {
        LaunchContext::host()
    }

    #[test]
    fn test_scalar_left_subtract_uses_reversal() {
        let c = ctx();
        let x = NDArray::scalar(&c, 5i32).unwrap();
        let y = NDArray::from_vec(&c, &[3], vec![1i32, 2, 3]).unwrap();
        let mut z = NDArray::zeros(&c, &[3], DataType::Int32).unwrap();
        let outcome = broadcast_apply(ArithmeticOp::Subtract.into(), &x, &y, &mut z).unwrap();
        assert!(matches!(outcome, Some(BroadcastOutcome::Target)));
        assert_eq!(z.to_vec::<i32>().unwrap(), vec![4, 3, 2]);
    }

    #[test]
    fn test_scalar_left_without_reversal() {
        let c = ctx();
        let x = NDArray::scalar(&c, 7i64).unwrap();
        let y = NDArray::from_vec(&c, &[2], vec![2i64, 3]).unwrap();
        let mut z = NDArray::zeros(&c, &[2], DataType::Int64).unwrap();
        broadcast_apply(ArithmeticOp::FloorMod.into(), &x, &y, &mut z).unwrap();
        assert_eq!(z.to_vec::<i64>().unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_scalar_left_materializes_when_output_differs() {
        let c = ctx();
        let x = NDArray::scalar(&c, 10.0f64).unwrap();
        let y = NDArray::from_vec(&c, &[2, 2], vec![1.0f64, 2.0, 4.0, 5.0]).unwrap();
        let mut z = NDArray::zeros(&c, &[4], DataType::Double).unwrap();
        let outcome = broadcast_apply(ArithmeticOp::Divide.into(), &x, &y, &mut z).unwrap();
        let Some(BroadcastOutcome::Materialized(tz)) = outcome else {
            panic!("expected a materialized result");
        };
        assert_eq!(tz.shape(), &[2, 2]);
        assert_eq!(tz.to_vec::<f64>().unwrap(), vec![10.0, 5.0, 2.5, 2.0]);
        assert_eq!(z.to_vec::<f64>().unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn test_empty_inputs_require_empty_output() {
        let c = ctx();
        let e = NDArray::empty(&c, DataType::Float32);
        let y = NDArray::zeros(&c, &[2], DataType::Float32).unwrap();
        let mut z = NDArray::zeros(&c, &[2], DataType::Float32).unwrap();
        let err = broadcast_apply(ArithmeticOp::Add.into(), &e, &y, &mut z).unwrap_err();
        assert!(err.to_string().contains("must be empty as well"));

        let mut ez = NDArray::empty(&c, DataType::Float32);
        assert!(matches!(
            broadcast_apply(ArithmeticOp::Add.into(), &e, &y, &mut ez),
            Ok(Some(BroadcastOutcome::Target))
        ));
    }

    #[test]
    fn test_column_times_row_tiles_left_operand() {
        let c = ctx();
        let col = NDArray::from_vec(&c, &[3, 1], vec![1i32, 2, 3]).unwrap();
        let row = NDArray::from_vec(&c, &[1, 2], vec![10i32, 100]).unwrap();
        let mut z = NDArray::zeros(&c, &[3, 2], DataType::Int32).unwrap();
        broadcast_apply(ArithmeticOp::Multiply.into(), &col, &row, &mut z).unwrap();
        assert_eq!(z.to_vec::<i32>().unwrap(), vec![10, 100, 20, 200, 30, 300]);
    }

    #[test]
    fn test_small_on_left_keeps_operand_order() {
        let c = ctx();
        let small = NDArray::from_vec(&c, &[2, 1], vec![100.0f32, 200.0]).unwrap();
        let full = NDArray::from_vec(&c, &[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut z = NDArray::zeros(&c, &[2, 3], DataType::Float32).unwrap();
        broadcast_apply(ArithmeticOp::Subtract.into(), &small, &full, &mut z).unwrap();
        assert_eq!(
            z.to_vec::<f32>().unwrap(),
            vec![99.0, 98.0, 97.0, 196.0, 195.0, 194.0]
        );
    }

    #[test]
    fn test_wrong_output_shape_is_an_error() {
        let c = ctx();
        let x = NDArray::zeros(&c, &[2, 3], DataType::Int32).unwrap();
        let y = NDArray::zeros(&c, &[3], DataType::Int32).unwrap();
        let mut z = NDArray::zeros(&c, &[3, 2], DataType::Int32).unwrap();
        assert!(matches!(
            broadcast_apply(ArithmeticOp::Add.into(), &x, &y, &mut z),
            Err(NdError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_bool_and_int_families() {
        let c = ctx();
        let x = NDArray::from_vec(&c, &[2, 2], vec![1i32, 5, 3, 7]).unwrap();
        let y = NDArray::from_vec(&c, &[2], vec![2i32, 6]).unwrap();
        let mut z = NDArray::zeros(&c, &[2, 2], DataType::Bool).unwrap();
        broadcast_apply(BoolOp::GreaterThan.into(), &x, &y, &mut z).unwrap();
        assert_eq!(z.to_vec::<bool>().unwrap(), vec![false, false, true, true]);

        let mut zi = NDArray::zeros(&c, &[2, 2], DataType::Int32).unwrap();
        broadcast_apply(IntOp::BitwiseOr.into(), &x, &y, &mut zi).unwrap();
        assert_eq!(zi.to_vec::<i32>().unwrap(), vec![3, 7, 3, 7]);

        let f = NDArray::zeros(&c, &[2], DataType::Float32).unwrap();
        assert!(matches!(
            broadcast_apply(IntOp::BitwiseOr.into(), &x, &f, &mut zi),
            Err(NdError::Unsupported { .. })
        ));
    }
}
