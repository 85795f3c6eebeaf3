//! Views: permutation, reshaping, sub-ranges, TAD sub-arrays and diagonals.
//!
//! Every function here returns an array sharing the source buffer, except
//! [`NDArray::reshape`] when no re-striding can express the new shape.

use crate::array::NDArray;
use crate::error::{NdError, NdResult};
use crate::shape::ShapeDescriptor;
use crate::tad::{complement_dims, TadPack};
use crate::types::{Order, Shape};
use std::sync::Arc;

/// Selection along one axis for [`NDArray::subarray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRange {
    /// The whole axis
    All,
    /// A single index
    Point(usize),
    /// Half-open `start..end`
    Interval(usize, usize),
    /// Half-open `start..end` taking every `step`-th index
    Strided(usize, usize, usize),
}

/// Which matrix a [`NDArray::diagonal`] view has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagonalKind {
    /// `[1, n]`
    Row,
    /// `[n, 1]`
    Column,
}

impl NDArray {
    /// A view with the same shape over the same buffer.
    pub fn view(&self) -> NDArray {
        self.view_with(self.descriptor(), self.offset)
    }

    /// View with axes reordered by `dims`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidDimensions`] unless `dims` is a permutation
    /// of `0..rank`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
    /// let p = a.permute(&[1, 0]).unwrap();
    /// assert_eq!(p.shape(), &[3, 2]);
    /// assert_eq!(p.strides(), &[1, 3]);
    /// assert_eq!(p.to_vec::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
    /// ```
    pub fn permute(&self, dims: &[usize]) -> NdResult<NDArray> {
        let descriptor = self.descriptor().permute(dims)?;
        Ok(self.view_with(&descriptor, self.offset))
    }

    /// Permute this array's own shape in place.
    pub fn permutei(&mut self, dims: &[usize]) -> NdResult<()> {
        let descriptor = self.descriptor().permute(dims)?;
        self.set_descriptor(&descriptor);
        Ok(())
    }

    /// View with the axes reversed.
    pub fn transpose(&self) -> NDArray {
        let descriptor = self.descriptor().transpose();
        self.view_with(&descriptor, self.offset)
    }

    pub fn transposei(&mut self) {
        let descriptor = self.descriptor().transpose();
        self.set_descriptor(&descriptor);
    }

    fn check_reshape_length(&self, shape: &[usize]) -> NdResult<()> {
        let new_length: usize = shape.iter().product();
        if new_length != self.length {
            return Err(NdError::invalid_argument(
                "reshape",
                format!(
                    "cannot reshape {:?} ({} elements) into {:?} ({} elements)",
                    self.shape(),
                    self.length,
                    shape,
                    new_length
                ),
            ));
        }
        Ok(())
    }

    /// Array with new extents, traversing elements in `order`.
    ///
    /// Returns a view when the current strides allow it, otherwise a
    /// contiguous copy.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidArgument`] when the element counts differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray, Order};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
    ///
    /// let r = a.reshape(Order::C, &[3, 2]).unwrap();
    /// assert!(r.is_view());
    ///
    /// // the transpose is not contiguous in C order, so flattening copies
    /// let flat = a.transpose().reshape(Order::C, &[6]).unwrap();
    /// assert!(!flat.is_view());
    /// assert_eq!(flat.to_vec::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
    /// ```
    pub fn reshape(&self, order: Order, shape: &[usize]) -> NdResult<NDArray> {
        self.check_reshape_length(shape)?;
        if let Some(descriptor) = self.descriptor().reshape_view(order, shape) {
            return Ok(self.view_with(&descriptor, self.offset));
        }
        tracing::debug!(from = ?self.shape(), to = ?shape, "reshape falls back to a copy");
        let mut copy = self.dup(Some(order))?;
        copy.reshape_copied(order, shape)?;
        Ok(copy)
    }

    fn reshape_copied(&mut self, order: Order, shape: &[usize]) -> NdResult<()> {
        let descriptor = self
            .descriptor()
            .reshape_view(order, shape)
            .ok_or_else(|| {
                NdError::invalid_argument("reshape", "contiguous copy cannot be reshaped")
            })?;
        self.set_descriptor(&descriptor);
        Ok(())
    }

    /// Reshape in place.
    ///
    /// When no view exists and `copy_to_new_buff` is set the data moves to a
    /// fresh contiguous buffer; without it the array is left untouched and
    /// `false` is returned.
    pub fn reshapei(
        &mut self,
        order: Order,
        shape: &[usize],
        copy_to_new_buff: bool,
    ) -> NdResult<bool> {
        self.check_reshape_length(shape)?;
        if let Some(descriptor) = self.descriptor().reshape_view(order, shape) {
            self.set_descriptor(&descriptor);
            return Ok(true);
        }
        if !copy_to_new_buff {
            return Ok(false);
        }
        let mut copy = self.dup(Some(order))?;
        copy.reshape_copied(order, shape)?;
        *self = copy;
        Ok(true)
    }

    /// View selecting `ranges` along the leading axes.
    ///
    /// Axes past `ranges.len()` are taken whole. Axes selected with
    /// [`SubRange::Point`] are dropped unless `keep_unities` is set.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidArgument`] for more ranges than axes, a zero
    /// step, or a range past the axis extent.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray, SubRange};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[3, 4], (0..12).collect::<Vec<i32>>()).unwrap();
    /// let s = a.subarray(&[SubRange::Interval(1, 3), SubRange::Strided(0, 4, 2)], false).unwrap();
    /// assert_eq!(s.shape(), &[2, 2]);
    /// assert_eq!(s.to_vec::<i32>().unwrap(), vec![4, 6, 8, 10]);
    /// ```
    pub fn subarray(&self, ranges: &[SubRange], keep_unities: bool) -> NdResult<NDArray> {
        let rank = self.rank_of();
        if ranges.len() > rank {
            return Err(NdError::invalid_argument(
                "subarray",
                format!("{} ranges given for rank {}", ranges.len(), rank),
            ));
        }
        let mut extents = Shape::new();
        let mut strides = Shape::new();
        let mut offset = 0usize;
        for (axis, (&extent, &stride)) in self.shape().iter().zip(self.strides()).enumerate() {
            let range = ranges.get(axis).copied().unwrap_or(SubRange::All);
            let out_of_range = || {
                NdError::invalid_argument(
                    "subarray",
                    format!("range {range:?} does not fit axis {axis} of extent {extent}"),
                )
            };
            let (start, end, step) = match range {
                SubRange::All => (0, extent, 1),
                SubRange::Point(i) => (i, i.checked_add(1).ok_or_else(out_of_range)?, 1),
                SubRange::Interval(start, end) => (start, end, 1),
                SubRange::Strided(start, end, step) => (start, end, step),
            };
            if step == 0 || start > end || end > extent {
                return Err(out_of_range());
            }
            let count = (end - start).div_ceil(step);
            if count > 0 {
                offset += start * stride;
            }
            if matches!(range, SubRange::Point(_)) && !keep_unities {
                continue;
            }
            extents.push(count);
            strides.push(stride * step);
        }
        let descriptor =
            ShapeDescriptor::with_strides(self.dtype, self.ordering(), &extents, &strides)?;
        Ok(self.view_with(&descriptor, self.offset + offset))
    }

    /// Convenience for [`NDArray::subarray`] with `start..end` on every leading axis.
    pub fn subarray_intervals(&self, intervals: &[(usize, usize)]) -> NdResult<NDArray> {
        let ranges: Vec<SubRange> = intervals
            .iter()
            .map(|&(start, end)| SubRange::Interval(start, end))
            .collect();
        self.subarray(&ranges, true)
    }

    /// The `index`-th sub-array of the TAD pack excluding `dims_to_exclude`.
    ///
    /// # Errors
    ///
    /// Propagates the dimension checks of [`crate::tad::compute_tad`] and
    /// returns [`NdError::IndexOutOfBounds`] past the last sub-array.
    pub fn sub_array_at(
        &self,
        index: usize,
        dims_to_exclude: &[usize],
        keep_unities: bool,
    ) -> NdResult<NDArray> {
        let pack = self
            .context
            .tad_pack(self.descriptor(), dims_to_exclude, keep_unities)?;
        self.tad_view(&pack, index)
    }

    fn tad_view(&self, pack: &TadPack, index: usize) -> NdResult<NDArray> {
        let offset = pack
            .offsets()
            .get(index)
            .ok_or_else(|| NdError::out_of_bounds(&[index], &[pack.number_of_tads()]))?;
        Ok(self.view_with(pack.sub_shape(), self.offset + offset))
    }

    /// TAD pack whose sub-arrays span `dims`, in any order.
    pub fn tad_for_dimensions(&self, dims: &[usize]) -> NdResult<Arc<TadPack>> {
        let rank = self.rank_of();
        let mut spanned = Shape::from_slice(dims);
        spanned.sort_unstable();
        spanned.dedup();
        if let Some(&bad) = spanned.iter().find(|&&d| d >= rank) {
            return Err(NdError::invalid_dimensions(
                dims,
                rank,
                format!("axis {bad} is out of range"),
            ));
        }
        let excluded = complement_dims(rank, &spanned);
        self.context.tad_pack(self.descriptor(), &excluded, false)
    }

    /// Number of sub-arrays spanning `dims`.
    pub fn tensors_along_dimension(&self, dims: &[usize]) -> NdResult<usize> {
        Ok(self.tad_for_dimensions(dims)?.number_of_tads())
    }

    /// The `index`-th sub-array spanning `dims`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
    /// assert_eq!(a.tensors_along_dimension(&[0]).unwrap(), 3);
    /// let col = a.tensor_along_dimension(2, &[0]).unwrap();
    /// assert_eq!(col.to_vec::<i32>().unwrap(), vec![3, 6]);
    /// ```
    pub fn tensor_along_dimension(&self, index: usize, dims: &[usize]) -> NdResult<NDArray> {
        let pack = self.tad_for_dimensions(dims)?;
        self.tad_view(&pack, index)
    }

    /// Every sub-array spanning `dims`, in TAD order.
    pub fn all_tensors_along_dimension(&self, dims: &[usize]) -> NdResult<Vec<NDArray>> {
        let pack = self.tad_for_dimensions(dims)?;
        Ok(pack
            .offsets()
            .iter()
            .map(|off| self.view_with(pack.sub_shape(), self.offset + off))
            .collect())
    }

    /// View of the main diagonal shaped as a row or column matrix.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::RankMismatch`] for arrays of rank below 2.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DiagonalKind, LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[3, 3], (1..=9).collect::<Vec<i64>>()).unwrap();
    /// let d = a.diagonal(DiagonalKind::Column).unwrap();
    /// assert_eq!(d.shape(), &[3, 1]);
    /// assert_eq!(d.to_vec::<i64>().unwrap(), vec![1, 5, 9]);
    /// ```
    pub fn diagonal(&self, kind: DiagonalKind) -> NdResult<NDArray> {
        if self.rank_of() < 2 {
            return Err(NdError::rank_mismatch("diagonal", 2, self.rank_of()));
        }
        let n = self.shape().iter().copied().min().unwrap_or(0);
        let step: usize = self.strides().iter().sum();
        let (extents, strides) = match kind {
            DiagonalKind::Row => ([1, n], [step * n.max(1), step]),
            DiagonalKind::Column => ([n, 1], [step, step]),
        };
        let descriptor =
            ShapeDescriptor::with_strides(self.dtype, self.ordering(), &extents, &strides)?;
        Ok(self.view_with(&descriptor, self.offset))
    }
}
