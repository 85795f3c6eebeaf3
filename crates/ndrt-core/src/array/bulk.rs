//! Whole-array operations: assignment, copies, casts, tiling and repetition.

use crate::array::NDArray;
use crate::error::{NdError, NdResult};
use crate::types::{DataType, Order, Scalar, Shape};
use smallvec::smallvec;

/// Pad `extents` and `strides` with leading unit axes up to `rank`.
fn pad_front(extents: &[usize], strides: &[usize], rank: usize) -> (Shape, Shape) {
    let missing = rank - extents.len();
    let mut padded_extents: Shape = smallvec![1; missing];
    let mut padded_strides: Shape = smallvec![0; missing];
    padded_extents.extend_from_slice(extents);
    padded_strides.extend_from_slice(strides);
    (padded_extents, padded_strides)
}

/// Source offsets for every element of `out_extents` in row-major order,
/// reading source coordinate `c % extent` along each axis.
///
/// Serves both tiling and unit-axis broadcasting.
pub(crate) fn tiled_offsets(extents: &[usize], strides: &[usize], out_extents: &[usize]) -> Vec<usize> {
    debug_assert_eq!(extents.len(), out_extents.len());
    let total: usize = out_extents.iter().product();
    let mut offsets = Vec::with_capacity(total);
    let mut coords: Shape = smallvec![0; out_extents.len()];
    for _ in 0..total {
        offsets.push(
            coords
                .iter()
                .zip(extents.iter().zip(strides))
                .map(|(&c, (&e, &s))| (c % e) * s)
                .sum(),
        );
        for d in (0..out_extents.len()).rev() {
            coords[d] += 1;
            if coords[d] < out_extents[d] {
                break;
            }
            coords[d] = 0;
        }
    }
    offsets
}

impl NDArray {
    fn reject_strings(&self, operation: &str) -> NdResult<()> {
        if self.dtype.is_s() {
            return Err(NdError::unsupported(operation, self.dtype));
        }
        Ok(())
    }

    /// Copy `other`'s elements into this array in logical order, casting to
    /// this array's data type.
    ///
    /// A single-element source is broadcast to every element.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidArgument`] when the lengths differ and the
    /// source has more than one element.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let mut a = NDArray::zeros(&ctx, &[2, 2], DataType::Int32).unwrap();
    /// let b = NDArray::from_vec(&ctx, &[4], vec![1.5f64, 2.5, 3.5, 4.5]).unwrap();
    /// a.assign(&b).unwrap();
    /// assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
    /// ```
    pub fn assign(&mut self, other: &NDArray) -> NdResult<()> {
        self.reject_strings("assign")?;
        other.reject_strings("assign")?;
        if self.length == 0 && other.length == 0 {
            return Ok(());
        }
        if other.length == 1 {
            return self.fill_scalar(other.get_scalar(0)?);
        }
        if other.length != self.length {
            return Err(NdError::invalid_argument(
                "assign",
                format!(
                    "lengths of arrays are mismatched: {:?} vs {:?}",
                    self.shape(),
                    other.shape()
                ),
            ));
        }
        let values = other.to_scalars()?;
        self.write_scalars(values)
    }

    /// Set every element to `value`, cast to this array's data type.
    pub fn assign_scalar(&mut self, value: impl Into<Scalar>) -> NdResult<()> {
        self.reject_strings("assign_scalar")?;
        if self.length == 0 {
            return Ok(());
        }
        self.fill_scalar(value.into())
    }

    /// Copy assignment: writes in place when shape and type match, otherwise
    /// replaces this array with a deep copy of `other`.
    pub fn copy_assign(&mut self, other: &NDArray) -> NdResult<()> {
        if !self.dtype.is_s() && self.are_same_shape_and_type(other) {
            return self.assign(other);
        }
        *self = other.dup(None)?;
        Ok(())
    }

    /// Deep copy into a fresh contiguous buffer.
    ///
    /// `order` defaults to this array's order.
    pub fn dup(&self, order: Option<Order>) -> NdResult<NDArray> {
        if self.dtype.is_s() {
            let strings = self.strings()?;
            return NDArray::from_strings(&self.context, self.shape(), &strings, self.dtype);
        }
        let order = order.unwrap_or(self.ordering());
        let descriptor = self.descriptor().contiguous(order);
        let copy = NDArray::with_descriptor(&self.context, &descriptor)?;
        if self.length == 0 {
            return Ok(copy);
        }
        if self.descriptor().is_contiguous() && self.ordering() == order {
            let n_bytes = self.length * self.size_of_t();
            copy.buffer
                .copy_buffer_from(&self.buffer, n_bytes, 0, self.offset)?;
        } else {
            copy.write_scalars(self.to_scalars()?)?;
        }
        Ok(copy)
    }

    /// Copy with every element converted to `dtype`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[3], vec![-1.5f32, 0.0, 2.9]).unwrap();
    /// let b = a.cast(DataType::Int8).unwrap();
    /// assert_eq!(b.to_vec::<i8>().unwrap(), vec![-1, 0, 2]);
    /// ```
    pub fn cast(&self, dtype: DataType) -> NdResult<NDArray> {
        if dtype == self.dtype {
            return self.dup(None);
        }
        self.reject_strings("cast")?;
        if dtype.is_s() {
            return Err(NdError::unsupported("cast", dtype));
        }
        let descriptor = self
            .descriptor()
            .contiguous(self.ordering())
            .with_data_type(dtype);
        let out = NDArray::with_descriptor(&self.context, &descriptor)?;
        if self.length > 0 {
            out.write_scalars(self.to_scalars()?)?;
        }
        Ok(out)
    }

    fn gather_tiled(&self, out_shape: &[usize]) -> NdResult<NDArray> {
        let (extents, strides) = pad_front(self.shape(), self.strides(), out_shape.len());
        let out = NDArray::zeros(&self.context, out_shape, self.dtype)?;
        if out.length > 0 {
            let values = self.gather_scalars(tiled_offsets(&extents, &strides, out_shape))?;
            out.write_scalars(values)?;
        }
        Ok(out)
    }

    /// Repeat the whole array `reps[i]` times along axis `i`.
    ///
    /// Shorter of `reps` and the shape is padded with leading ones.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2], vec![1u8, 2]).unwrap();
    /// let t = a.tile(&[2, 2]).unwrap();
    /// assert_eq!(t.shape(), &[2, 4]);
    /// assert_eq!(t.to_vec::<u8>().unwrap(), vec![1, 2, 1, 2, 1, 2, 1, 2]);
    /// ```
    pub fn tile(&self, reps: &[usize]) -> NdResult<NDArray> {
        self.reject_strings("tile")?;
        let rank = reps.len().max(self.rank_of());
        let (extents, _) = pad_front(self.shape(), self.strides(), rank);
        let mut padded_reps: Shape = smallvec![1; rank - reps.len()];
        padded_reps.extend_from_slice(reps);
        let out_shape: Shape = extents
            .iter()
            .zip(&padded_reps)
            .map(|(e, r)| e * r)
            .collect();
        self.gather_tiled(&out_shape)
    }

    fn check_tileable(&self, shape: &[usize]) -> NdResult<()> {
        if shape.len() < self.rank_of() {
            return Err(NdError::shape_mismatch("tile_to_shape", self.shape(), shape));
        }
        let (extents, _) = pad_front(self.shape(), self.strides(), shape.len());
        if extents
            .iter()
            .zip(shape)
            .any(|(&e, &s)| e == 0 || s % e != 0)
        {
            return Err(NdError::shape_mismatch("tile_to_shape", self.shape(), shape));
        }
        Ok(())
    }

    /// Tile until the array has exactly `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::ShapeMismatch`] unless every target extent is a
    /// multiple of the matching (front padded) source extent.
    pub fn tile_to_shape(&self, shape: &[usize]) -> NdResult<NDArray> {
        self.reject_strings("tile_to_shape")?;
        self.check_tileable(shape)?;
        self.gather_tiled(shape)
    }

    /// Tile into `target`, casting to its data type.
    pub fn tile_to_shape_into(&self, target: &mut NDArray) -> NdResult<()> {
        self.reject_strings("tile_to_shape")?;
        target.reject_strings("tile_to_shape")?;
        let shape = Shape::from_slice(target.shape());
        self.check_tileable(&shape)?;
        if target.length == 0 {
            return Ok(());
        }
        let (extents, strides) = pad_front(self.shape(), self.strides(), shape.len());
        let values = self.gather_scalars(tiled_offsets(&extents, &strides, &shape))?;
        target.write_scalars(values)
    }

    /// Repeat each index along `axis`.
    ///
    /// `repeats` holds either one count applied to every index, or one
    /// count per index of the axis.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2, 2], vec![1i32, 2, 3, 4]).unwrap();
    /// let r = a.repeat(1, &[1, 2]).unwrap();
    /// assert_eq!(r.shape(), &[2, 3]);
    /// assert_eq!(r.to_vec::<i32>().unwrap(), vec![1, 2, 2, 3, 4, 4]);
    /// ```
    pub fn repeat(&self, axis: usize, repeats: &[usize]) -> NdResult<NDArray> {
        self.reject_strings("repeat")?;
        let extent = self.size_at(axis)?;
        if repeats.len() != 1 && repeats.len() != extent {
            return Err(NdError::invalid_argument(
                "repeat",
                format!(
                    "expected 1 or {} repeat counts, got {}",
                    extent,
                    repeats.len()
                ),
            ));
        }
        let source_index: Vec<usize> = (0..extent)
            .flat_map(|i| {
                let count = if repeats.len() == 1 { repeats[0] } else { repeats[i] };
                std::iter::repeat(i).take(count)
            })
            .collect();

        let mut out_shape = Shape::from_slice(self.shape());
        out_shape[axis] = source_index.len();
        let out = NDArray::zeros(&self.context, &out_shape, self.dtype)?;
        if out.length == 0 {
            return Ok(out);
        }

        let out_desc = out.descriptor().clone();
        let src_desc = self.descriptor();
        let offsets = (0..out.length).map(|k| {
            let mut coords = out_desc.index_to_coords(k);
            coords[axis] = source_index[coords[axis]];
            src_desc.offset_of_coords(&coords)
        });
        out.write_scalars(self.gather_scalars(offsets)?)?;
        Ok(out)
    }

    /// Fill with `start, start + step, ...` in logical order.
    pub fn fill_linspace(&mut self, start: f64, step: f64) -> NdResult<()> {
        self.reject_strings("fill_linspace")?;
        self.write_scalars((0..self.length).map(|i| Scalar::Float(start + i as f64 * step)))
    }

    /// Same shape, same data type and element-wise equal within `eps`.
    ///
    /// Integer and boolean elements must match exactly.
    pub fn equals_to(&self, other: &NDArray, eps: f64) -> bool {
        if !self.are_same_shape_and_type(other) {
            return false;
        }
        if self.dtype.is_s() {
            return matches!((self.strings(), other.strings()), (Ok(a), Ok(b)) if a == b);
        }
        let (Ok(a), Ok(b)) = (self.to_scalars(), other.to_scalars()) else {
            return false;
        };
        a.iter().zip(&b).all(|(x, y)| match (x, y) {
            (Scalar::Float(x), Scalar::Float(y)) => x == y || (x - y).abs() <= eps,
            _ => x == y,
        })
    }
}
