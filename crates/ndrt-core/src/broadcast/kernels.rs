//! Execution backends for broadcast dispatch.

use crate::array::NDArray;
use crate::broadcast::BroadcastOp;
use crate::error::{NdError, NdResult};
use crate::shape::OffsetIter;
use crate::tad::TadPack;
use crate::types::Scalar;

/// The kernels broadcast dispatch chooses between.
///
/// Implementations read every input before writing the output, so the
/// output may share a buffer with an input.
pub trait BroadcastKernels {
    /// `z[i] = op(x[i], y[i])` over equal-length arrays in logical order.
    fn pairwise(&self, op: BroadcastOp, x: &NDArray, y: &NDArray, z: &mut NDArray)
        -> NdResult<()>;

    /// `z[i] = op(array[i], s)`, or `op(s, array[i])` with `scalar_on_left`,
    /// where `s` is the single element of `scalar`.
    fn scalar(
        &self,
        op: BroadcastOp,
        array: &NDArray,
        scalar: &NDArray,
        z: &mut NDArray,
        scalar_on_left: bool,
    ) -> NdResult<()>;

    /// Apply `op` between every TAD of `full` and the whole of `small`.
    ///
    /// `full_pack` and `z_pack` decompose `full` and `z` identically; each
    /// sub-array has `small.length_of()` elements.
    #[allow(clippy::too_many_arguments)]
    fn broadcast(
        &self,
        op: BroadcastOp,
        full: &NDArray,
        small: &NDArray,
        z: &mut NDArray,
        full_pack: &TadPack,
        z_pack: &TadPack,
        small_on_left: bool,
    ) -> NdResult<()>;
}

/// Host implementation over [`Scalar`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostKernels;

fn tad_offsets(pack: &TadPack) -> impl Iterator<Item = usize> + '_ {
    let sub = pack.sub_shape();
    pack.offsets().iter().flat_map(move |&base| {
        OffsetIter::new(sub.extents(), sub.strides()).map(move |off| base + off)
    })
}

impl BroadcastKernels for HostKernels {
    fn pairwise(
        &self,
        op: BroadcastOp,
        x: &NDArray,
        y: &NDArray,
        z: &mut NDArray,
    ) -> NdResult<()> {
        if x.length_of() != y.length_of() || z.length_of() != x.length_of() {
            return Err(NdError::shape_mismatch("pairwise", x.shape(), y.shape()));
        }
        NDArray::prepare_primary_use(&[&*z], &[x, y], false)?;
        let dtype = z.data_type();
        let xs = x.to_scalars()?;
        let ys = y.to_scalars()?;
        z.write_scalars(xs.into_iter().zip(ys).map(|(a, b)| op.apply(a, b, dtype)))?;
        NDArray::register_primary_use(&[&*z], &[x, y]);
        Ok(())
    }

    fn scalar(
        &self,
        op: BroadcastOp,
        array: &NDArray,
        scalar: &NDArray,
        z: &mut NDArray,
        scalar_on_left: bool,
    ) -> NdResult<()> {
        if z.length_of() != array.length_of() {
            return Err(NdError::shape_mismatch("scalar", array.shape(), z.shape()));
        }
        NDArray::prepare_primary_use(&[&*z], &[array, scalar], false)?;
        let dtype = z.data_type();
        let s = scalar.get_scalar(0)?;
        let values = array.to_scalars()?;
        z.write_scalars(values.into_iter().map(|v| {
            if scalar_on_left {
                op.apply(s, v, dtype)
            } else {
                op.apply(v, s, dtype)
            }
        }))?;
        NDArray::register_primary_use(&[&*z], &[array, scalar]);
        Ok(())
    }

    fn broadcast(
        &self,
        op: BroadcastOp,
        full: &NDArray,
        small: &NDArray,
        z: &mut NDArray,
        full_pack: &TadPack,
        z_pack: &TadPack,
        small_on_left: bool,
    ) -> NdResult<()> {
        let sub_length = small.length_of();
        if full_pack.sub_length() != sub_length
            || z_pack.sub_length() != sub_length
            || full_pack.number_of_tads() != z_pack.number_of_tads()
        {
            return Err(NdError::shape_mismatch("broadcast", full.shape(), small.shape()));
        }
        NDArray::prepare_primary_use(&[&*z], &[full, small], false)?;
        let dtype = z.data_type();
        let small_values = small.to_scalars()?;
        let full_values = full.gather_scalars(tad_offsets(full_pack))?;
        let results = full_values.into_iter().enumerate().map(|(k, a)| {
            let b = small_values[k % sub_length];
            if small_on_left {
                op.apply(b, a, dtype)
            } else {
                op.apply(a, b, dtype)
            }
        });
        let z_offsets: Vec<usize> = tad_offsets(z_pack).collect();
        z.scatter_scalars(z_offsets, results.collect::<Vec<Scalar>>())?;
        NDArray::register_primary_use(&[&*z], &[full, small]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ArithmeticOp;
    use crate::types::DataType;
    use crate::LaunchContext;

    #[test]
    fn test_pairwise_into_aliasing_output() {
        let ctx = LaunchContext::host();
        let x = NDArray::from_vec(&ctx, &[3], vec![1i32, 2, 3]).unwrap();
        let y = NDArray::from_vec(&ctx, &[3], vec![10i32, 20, 30]).unwrap();
        let mut z = x.view();
        HostKernels
            .pairwise(ArithmeticOp::Add.into(), &x, &y, &mut z)
            .unwrap();
        assert_eq!(x.to_vec::<i32>().unwrap(), vec![11, 22, 33]);
    }

    #[test]
    fn test_scalar_operand_order() {
        let ctx = LaunchContext::host();
        let x = NDArray::from_vec(&ctx, &[2], vec![1.0f32, 4.0]).unwrap();
        let s = NDArray::scalar(&ctx, 2.0f32).unwrap();
        let mut z = NDArray::zeros(&ctx, &[2], DataType::Float32).unwrap();
        let div = ArithmeticOp::Divide.into();
        HostKernels.scalar(div, &x, &s, &mut z, false).unwrap();
        assert_eq!(z.to_vec::<f32>().unwrap(), vec![0.5, 2.0]);
        HostKernels.scalar(div, &x, &s, &mut z, true).unwrap();
        assert_eq!(z.to_vec::<f32>().unwrap(), vec![2.0, 0.5]);
    }

    #[test]
    fn test_broadcast_rows() {
        let ctx = LaunchContext::host();
        let full = NDArray::from_vec(&ctx, &[2, 3], vec![0i64, 1, 2, 3, 4, 5]).unwrap();
        let small = NDArray::from_vec(&ctx, &[3], vec![10i64, 20, 30]).unwrap();
        let mut z = NDArray::zeros(&ctx, &[2, 3], DataType::Int64).unwrap();
        let pack = ctx.tad_pack(full.descriptor(), &[0], false).unwrap();
        let z_pack = ctx.tad_pack(z.descriptor(), &[0], false).unwrap();
        HostKernels
            .broadcast(ArithmeticOp::Subtract.into(), &full, &small, &mut z, &pack, &z_pack, true)
            .unwrap();
        assert_eq!(z.to_vec::<i64>().unwrap(), vec![10, 19, 28, 7, 16, 25]);
    }

    #[test]
    fn test_length_checks() {
        let ctx = LaunchContext::host();
        let x = NDArray::zeros(&ctx, &[3], DataType::Int8).unwrap();
        let y = NDArray::zeros(&ctx, &[2], DataType::Int8).unwrap();
        let mut z = NDArray::zeros(&ctx, &[3], DataType::Int8).unwrap();
        assert!(HostKernels
            .pairwise(ArithmeticOp::Add.into(), &x, &y, &mut z)
            .is_err());
    }
}
