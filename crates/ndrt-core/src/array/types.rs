//! The NDArray handle and its shape predicates.

use crate::buffer::DataBuffer;
use crate::context::LaunchContext;
use crate::error::{NdError, NdResult};
use crate::shape::{ConstantShapeBuffer, ShapeDescriptor};
use crate::types::{ArrayKind, DataType, Order};
use std::sync::Arc;

/// N-dimensional array over a shared [`DataBuffer`]
///
/// An array is a view: a buffer handle, an interned shape descriptor and an
/// element offset into the buffer. Several arrays may share one buffer;
/// reshaping or permuting one of them never affects the others' shapes.
///
/// Logical element indices are always row-major over [`NDArray::shape`],
/// whatever the physical order.
///
/// # Examples
///
/// ```
/// use ndrt_core::{DataType, LaunchContext, NDArray};
///
/// let ctx = LaunchContext::host();
/// let a = NDArray::from_vec(&ctx, &[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
///
/// assert_eq!(a.shape(), &[2, 3]);
/// assert_eq!(a.data_type(), DataType::Float32);
/// assert_eq!(a.t::<f32>(&[1, 2]).unwrap(), 6.0);
///
/// let t = a.transpose();
/// assert_eq!(t.shape(), &[3, 2]);
/// assert_eq!(t.t::<f32>(&[2, 1]).unwrap(), 6.0);
/// assert!(t.is_view());
/// ```
pub struct NDArray {
    pub(crate) buffer: Arc<DataBuffer>,
    pub(crate) shape: ConstantShapeBuffer,
    pub(crate) offset: usize,
    pub(crate) is_view: bool,
    pub(crate) length: usize,
    pub(crate) dtype: DataType,
    pub(crate) context: Arc<LaunchContext>,
}

impl NDArray {
    pub(crate) fn from_parts(
        context: &Arc<LaunchContext>,
        buffer: Arc<DataBuffer>,
        descriptor: &ShapeDescriptor,
        offset: usize,
        is_view: bool,
    ) -> Self {
        Self {
            buffer,
            shape: context.intern(descriptor),
            offset,
            is_view,
            length: descriptor.length(),
            dtype: descriptor.data_type(),
            context: Arc::clone(context),
        }
    }

    /// A new view over the same buffer with another descriptor.
    pub(crate) fn view_with(&self, descriptor: &ShapeDescriptor, offset: usize) -> Self {
        Self::from_parts(
            &self.context,
            Arc::clone(&self.buffer),
            descriptor,
            offset,
            true,
        )
    }

    pub(crate) fn set_descriptor(&mut self, descriptor: &ShapeDescriptor) {
        self.shape = self.context.intern(descriptor);
        self.length = descriptor.length();
        self.dtype = descriptor.data_type();
    }

    pub fn descriptor(&self) -> &ShapeDescriptor {
        self.shape.descriptor()
    }

    /// Extents.
    pub fn shape(&self) -> &[usize] {
        self.descriptor().extents()
    }

    pub fn strides(&self) -> &[usize] {
        self.descriptor().strides()
    }

    pub fn rank_of(&self) -> usize {
        self.descriptor().rank()
    }

    pub fn length_of(&self) -> usize {
        self.length
    }

    /// Extent of `dim`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidDimensions`] when `dim` is not below the rank.
    pub fn size_at(&self, dim: usize) -> NdResult<usize> {
        self.shape()
            .get(dim)
            .copied()
            .ok_or_else(|| NdError::invalid_dimensions(&[dim], self.rank_of(), "no such axis"))
    }

    pub fn stride_at(&self, dim: usize) -> NdResult<usize> {
        self.strides()
            .get(dim)
            .copied()
            .ok_or_else(|| NdError::invalid_dimensions(&[dim], self.rank_of(), "no such axis"))
    }

    pub fn ordering(&self) -> Order {
        self.descriptor().order()
    }

    pub fn ews(&self) -> usize {
        self.descriptor().ews()
    }

    pub fn data_type(&self) -> DataType {
        self.dtype
    }

    pub fn size_of_t(&self) -> usize {
        self.dtype.size_of_element()
    }

    pub fn kind(&self) -> ArrayKind {
        self.descriptor().kind()
    }

    /// Whether this array was derived from another one and shares its buffer.
    pub fn is_view(&self) -> bool {
        self.is_view
    }

    /// Element offset of the first element inside the buffer.
    pub fn buffer_offset(&self) -> usize {
        self.offset
    }

    pub fn context(&self) -> &Arc<LaunchContext> {
        &self.context
    }

    pub fn data_buffer(&self) -> &Arc<DataBuffer> {
        &self.buffer
    }

    pub fn shape_buffer(&self) -> &ConstantShapeBuffer {
        &self.shape
    }

    /// Host-side encoded shape.
    pub fn shape_info(&self) -> &[i64] {
        self.shape.primary()
    }

    /// Device-side encoded shape, or the host one when not replicated.
    pub fn special_shape_info(&self) -> &[i64] {
        self.shape.special().unwrap_or_else(|| self.shape.primary())
    }

    /// Encoded shape for whichever side kernels run on.
    pub fn platform_shape_info(&self) -> &[i64] {
        if self.context.is_accelerated() {
            self.special_shape_info()
        } else {
            self.shape_info()
        }
    }

    /// Host pointer to the first element.
    ///
    /// Valid until the buffer is expanded or dropped.
    pub fn buffer(&self) -> *const u8 {
        self.buffer
            .primary_ptr()
            .wrapping_add(self.offset * self.size_of_t())
    }

    /// Device pointer to the first element, if the mirror is allocated.
    pub fn special_buffer(&self) -> Option<*const u8> {
        let byte_offset = self.offset * self.size_of_t();
        self.buffer
            .special_ptr()
            .map(|ptr| ptr.wrapping_add(byte_offset))
    }

    /// Pointer for whichever side kernels run on; null when the device
    /// mirror has not been allocated yet.
    pub fn platform_buffer(&self) -> *const u8 {
        if self.context.is_accelerated() {
            self.special_buffer().unwrap_or(std::ptr::null())
        } else {
            self.buffer()
        }
    }

    /// Bytes addressed by this array.
    pub fn memory_footprint(&self) -> usize {
        if self.dtype.is_s() {
            self.buffer.len_bytes()
        } else {
            self.length * self.size_of_t()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind() == ArrayKind::Empty
    }

    /// Rank 0, or a rank 1 / rank 2 array holding a single element.
    pub fn is_scalar(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        match self.shape() {
            [] => true,
            [n] => *n == 1,
            [r, c] => *r == 1 && *c == 1,
            _ => false,
        }
    }

    /// Rank 1, or rank 2 with one unit axis; never a scalar.
    pub fn is_vector(&self) -> bool {
        if self.is_empty() || self.is_scalar() {
            return false;
        }
        match self.shape() {
            [_] => true,
            [r, c] => *r == 1 || *c == 1,
            _ => false,
        }
    }

    /// Rank 2 with both extents above one.
    pub fn is_matrix(&self) -> bool {
        matches!(self.shape(), [r, c] if *r > 1 && *c > 1)
    }

    /// Rank 1, or a `[1, n]` matrix.
    pub fn is_row_vector(&self) -> bool {
        if self.is_empty() || self.is_scalar() {
            return false;
        }
        match self.shape() {
            [_] => true,
            [r, _] => *r == 1,
            _ => false,
        }
    }

    /// A `[n, 1]` matrix.
    pub fn is_column_vector(&self) -> bool {
        if self.is_empty() || self.is_scalar() {
            return false;
        }
        matches!(self.shape(), [_, c] if *c == 1)
    }

    /// Axis of the only non-unit extent, if exactly one exists.
    pub fn is_common_vector(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let mut non_unit = self
            .shape()
            .iter()
            .enumerate()
            .filter(|(_, &e)| e != 1)
            .map(|(axis, _)| axis);
        match (non_unit.next(), non_unit.next()) {
            (Some(axis), None) => Some(axis),
            _ => None,
        }
    }

    /// Row count of a matrix.
    pub fn rows(&self) -> NdResult<usize> {
        if self.rank_of() != 2 {
            return Err(NdError::rank_mismatch("rows", 2, self.rank_of()));
        }
        Ok(self.shape()[0])
    }

    pub fn columns(&self) -> NdResult<usize> {
        if self.rank_of() != 2 {
            return Err(NdError::rank_mismatch("columns", 2, self.rank_of()));
        }
        Ok(self.shape()[1])
    }

    pub fn is_r(&self) -> bool {
        self.dtype.is_r()
    }

    pub fn is_z(&self) -> bool {
        self.dtype.is_z()
    }

    pub fn is_b(&self) -> bool {
        self.dtype.is_b()
    }

    pub fn is_s(&self) -> bool {
        self.dtype.is_s()
    }

    /// Same extents. An empty array never matches a non-empty one.
    pub fn is_same_shape(&self, other: &NDArray) -> bool {
        self.is_empty() == other.is_empty() && self.shape() == other.shape()
    }

    /// Compare against extents where `None` matches any extent.
    ///
    /// The single-entry pattern `[Some(0)]` also matches a scalar.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::zeros(&ctx, &[2, 5], DataType::Int32).unwrap();
    /// assert!(a.is_same_shape_pattern(&[Some(2), None]));
    /// assert!(!a.is_same_shape_pattern(&[Some(3), None]));
    ///
    /// let s = NDArray::scalar(&ctx, 1i32).unwrap();
    /// assert!(s.is_same_shape_pattern(&[Some(0)]));
    /// ```
    pub fn is_same_shape_pattern(&self, pattern: &[Option<usize>]) -> bool {
        if self.is_scalar() && pattern == [Some(0)] {
            return true;
        }
        self.rank_of() == pattern.len()
            && self
                .shape()
                .iter()
                .zip(pattern)
                .all(|(extent, expected)| expected.map_or(true, |e| e == *extent))
    }

    /// Same extents, strides, order and kind.
    pub fn is_same_shape_strict(&self, other: &NDArray) -> bool {
        let (a, b) = (self.descriptor(), other.descriptor());
        a.extents() == b.extents()
            && a.strides() == b.strides()
            && a.order() == b.order()
            && a.kind() == b.kind()
    }

    pub fn are_same_shape_and_type(&self, other: &NDArray) -> bool {
        self.dtype == other.dtype && self.is_same_shape(other)
    }
}
