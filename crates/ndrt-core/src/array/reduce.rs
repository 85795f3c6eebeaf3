//! Reductions along dimensions, one TAD per output element.

use crate::array::NDArray;
use crate::element::read_scalar;
use crate::error::{NdError, NdResult};
use crate::shape::OffsetIter;
use crate::tad::complement_dims;
use crate::types::{DataType, Scalar, Shape};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reduction applied to every sub-array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReduceOp {
    Sum,
    Mean,
    Prod,
    Max,
    Min,
    /// Largest absolute value
    AMax,
    /// Smallest absolute value
    AMin,
    Norm1,
    Norm2,
    CountNonZero,
    CountZero,
    Any,
    All,
}

impl ReduceOp {
    /// Data type of the reduction result for an input of `input` type.
    pub fn output_type(self, input: DataType) -> DataType {
        match self {
            ReduceOp::Sum
            | ReduceOp::Prod
            | ReduceOp::Max
            | ReduceOp::Min
            | ReduceOp::AMax
            | ReduceOp::AMin => input,
            ReduceOp::Mean | ReduceOp::Norm1 | ReduceOp::Norm2 => {
                if input.is_r() {
                    input
                } else {
                    DataType::Float32
                }
            }
            ReduceOp::CountNonZero | ReduceOp::CountZero => DataType::Int64,
            ReduceOp::Any | ReduceOp::All => DataType::Bool,
        }
    }

    /// Reduce `values`, read from an array of type `input`.
    ///
    /// Integer sums and products wrap; an empty input yields the identity of
    /// the operation (negative infinity for a floating point `Max`).
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, ReduceOp, Scalar};
    ///
    /// let values = [Scalar::Int(-4), Scalar::Int(2)];
    /// assert_eq!(ReduceOp::AMax.reduce(DataType::Int32, &values), Scalar::Int(4));
    /// assert_eq!(ReduceOp::Mean.reduce(DataType::Int32, &values), Scalar::Float(-1.0));
    /// ```
    pub fn reduce(self, input: DataType, values: &[Scalar]) -> Scalar {
        let count = values.len();
        match self {
            ReduceOp::CountNonZero => {
                Scalar::Int(values.iter().filter(|v| v.to_bool()).count() as i64)
            }
            ReduceOp::CountZero => {
                Scalar::Int(values.iter().filter(|v| !v.to_bool()).count() as i64)
            }
            ReduceOp::Any => Scalar::Bool(values.iter().any(|v| v.to_bool())),
            ReduceOp::All => Scalar::Bool(values.iter().all(|v| v.to_bool())),
            ReduceOp::Mean => {
                Scalar::Float(values.iter().map(|v| v.to_f64()).sum::<f64>() / count as f64)
            }
            ReduceOp::Norm1 => Scalar::Float(values.iter().map(|v| v.to_f64().abs()).sum()),
            ReduceOp::Norm2 => Scalar::Float(
                values
                    .iter()
                    .map(|v| v.to_f64() * v.to_f64())
                    .sum::<f64>()
                    .sqrt(),
            ),
            _ if input.is_r() => Scalar::Float(self.reduce_float(values)),
            _ => {
                let wide = self.reduce_integer(values);
                if input.is_unsigned() {
                    Scalar::UInt(wide as u64)
                } else if input.is_b() {
                    Scalar::Bool(wide != 0)
                } else {
                    Scalar::Int(wide as i64)
                }
            }
        }
    }

    fn reduce_float(self, values: &[Scalar]) -> f64 {
        let it = values.iter().map(|v| v.to_f64());
        match self {
            ReduceOp::Sum => it.sum(),
            ReduceOp::Prod => it.product(),
            ReduceOp::Max => it.fold(f64::NEG_INFINITY, f64::max),
            ReduceOp::Min => it.fold(f64::INFINITY, f64::min),
            ReduceOp::AMax => it.map(f64::abs).fold(0.0, f64::max),
            ReduceOp::AMin => it.map(f64::abs).fold(f64::INFINITY, f64::min),
            _ => f64::NAN,
        }
    }

    fn reduce_integer(self, values: &[Scalar]) -> i128 {
        let it = values.iter().map(|v| match *v {
            Scalar::UInt(u) => i128::from(u),
            other => i128::from(other.to_i64()),
        });
        match self {
            ReduceOp::Sum => it.fold(0i128, i128::wrapping_add),
            ReduceOp::Prod => it.fold(1i128, i128::wrapping_mul),
            ReduceOp::Max => it.max().unwrap_or(0),
            ReduceOp::Min => it.min().unwrap_or(0),
            ReduceOp::AMax => it.map(i128::abs).max().unwrap_or(0),
            ReduceOp::AMin => it.map(i128::abs).min().unwrap_or(0),
            _ => 0,
        }
    }
}

impl NDArray {
    /// Reduce over `dims`; an empty `dims` reduces over every axis.
    ///
    /// With `keep_dims` the reduced axes remain as unit axes.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidDimensions`] for axes outside the rank and
    /// [`NdError::Unsupported`] for string arrays.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray, ReduceOp};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
    ///
    /// let rows = a.reduce_along_dimension(ReduceOp::Sum, &[1], false).unwrap();
    /// assert_eq!(rows.shape(), &[2]);
    /// assert_eq!(rows.to_vec::<i32>().unwrap(), vec![6, 15]);
    ///
    /// let cols = a.reduce_along_dimension(ReduceOp::Max, &[0], true).unwrap();
    /// assert_eq!(cols.shape(), &[1, 3]);
    /// assert_eq!(cols.to_vec::<i32>().unwrap(), vec![4, 5, 6]);
    /// ```
    pub fn reduce_along_dimension(
        &self,
        op: ReduceOp,
        dims: &[usize],
        keep_dims: bool,
    ) -> NdResult<NDArray> {
        if self.dtype.is_s() {
            return Err(NdError::unsupported("reduce_along_dimension", self.dtype));
        }
        let rank = self.rank_of();
        let mut reduced_dims = Shape::from_slice(dims);
        reduced_dims.sort_unstable();
        reduced_dims.dedup();
        let out_desc = self
            .descriptor()
            .reduced(&reduced_dims, keep_dims)?
            .with_data_type(op.output_type(self.dtype));
        let out = NDArray::with_descriptor(&self.context, &out_desc)?;
        if out.length == 0 {
            return Ok(out);
        }
        if self.length == 0 {
            out.fill_scalar(op.reduce(self.dtype, &[]))?;
            return Ok(out);
        }

        let excluded = if reduced_dims.is_empty() {
            Shape::new()
        } else {
            complement_dims(rank, &reduced_dims)
        };
        let pack = self.context.tad_pack(self.descriptor(), &excluded, false)?;
        let sub = pack.sub_shape();
        let (dtype, size, base) = (self.dtype, self.size_of_t(), self.offset);
        let parallel = pack.number_of_tads() >= self.context.config().parallel_threshold;
        tracing::debug!(
            ?op,
            tads = pack.number_of_tads(),
            sub_length = pack.sub_length(),
            parallel,
            "reduce along dimension"
        );

        let results = self.buffer.read_primary_with(|bytes| {
            let reduce_one = |tad_offset: &usize| -> NdResult<Scalar> {
                let values = OffsetIter::new(sub.extents(), sub.strides())
                    .map(|off| {
                        let start = (base + tad_offset + off) * size;
                        let slice = bytes.get(start..start + size).ok_or_else(|| {
                            NdError::size_mismatch("reduce", start + size, bytes.len())
                        })?;
                        read_scalar(dtype, slice)
                    })
                    .collect::<NdResult<Vec<Scalar>>>()?;
                Ok(op.reduce(dtype, &values))
            };
            reduce_all(pack.offsets(), parallel, reduce_one)
        })?;
        out.write_scalars(results)?;
        Ok(out)
    }

    /// Reduce every element into a rank 0 array.
    pub fn reduce_number(&self, op: ReduceOp) -> NdResult<NDArray> {
        self.reduce_along_dimension(op, &[], false)
    }
}

#[cfg(feature = "parallel")]
fn reduce_all<F>(offsets: &[usize], parallel: bool, f: F) -> NdResult<Vec<Scalar>>
where
    F: Fn(&usize) -> NdResult<Scalar> + Sync + Send,
{
    if parallel {
        offsets.par_iter().map(f).collect()
    } else {
        offsets.iter().map(f).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn reduce_all<F>(offsets: &[usize], _parallel: bool, f: F) -> NdResult<Vec<Scalar>>
where
    F: Fn(&usize) -> NdResult<Scalar>,
{
    offsets.iter().map(f).collect()
}
