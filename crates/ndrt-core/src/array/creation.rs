//! Array construction: allocation, filling from host data and wrapping buffers.

use crate::array::NDArray;
use crate::buffer::DataBuffer;
use crate::context::LaunchContext;
use crate::element::{write_scalar, Element};
use crate::error::{NdError, NdResult};
use crate::shape::ShapeDescriptor;
use crate::types::{DataType, Order, Scalar};
use std::ptr::NonNull;
use std::sync::Arc;

impl NDArray {
    /// Allocate a zero-filled array.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::Unsupported`] for string types (see
    /// [`NDArray::from_strings`]) and [`NdError::Allocation`] when the memory
    /// ledger refuses the allocation.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray, Order};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::new(&ctx, Order::F, &[2, 3], DataType::Int64).unwrap();
    /// assert_eq!(a.strides(), &[1, 2]);
    /// assert_eq!(a.e::<i64>(5).unwrap(), 0);
    /// ```
    pub fn new(
        context: &Arc<LaunchContext>,
        order: Order,
        shape: &[usize],
        dtype: DataType,
    ) -> NdResult<Self> {
        let descriptor = ShapeDescriptor::new(dtype, order, shape)?;
        Self::with_descriptor(context, &descriptor)
    }

    /// Row-major zero-filled array.
    pub fn zeros(context: &Arc<LaunchContext>, shape: &[usize], dtype: DataType) -> NdResult<Self> {
        Self::new(context, Order::C, shape, dtype)
    }

    /// Allocate zero-filled storage for an arbitrary descriptor, including strided ones.
    pub fn with_descriptor(
        context: &Arc<LaunchContext>,
        descriptor: &ShapeDescriptor,
    ) -> NdResult<Self> {
        let dtype = descriptor.data_type();
        if dtype.is_s() {
            return Err(NdError::unsupported(
                "NDArray::with_descriptor (use from_strings)",
                dtype,
            ));
        }
        let len_bytes = descriptor.span() * dtype.size_of_element();
        let buffer = if len_bytes == 0 {
            DataBuffer::empty(dtype, context)
        } else {
            DataBuffer::new(len_bytes, dtype, context)?
        };
        Ok(Self::from_parts(
            context,
            Arc::new(buffer),
            descriptor,
            0,
            false,
        ))
    }

    /// Array with the same shape, order and type, zero filled.
    pub fn like(&self) -> NdResult<Self> {
        let descriptor = self.descriptor().contiguous(self.ordering());
        Self::with_descriptor(&self.context, &descriptor)
    }

    /// Same as [`NDArray::like`] with another data type.
    pub fn like_with_type(&self, dtype: DataType) -> NdResult<Self> {
        let descriptor = self
            .descriptor()
            .contiguous(self.ordering())
            .with_data_type(dtype);
        Self::with_descriptor(&self.context, &descriptor)
    }

    /// Row-major array from typed host data.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidArgument`] when `data.len()` differs from the
    /// product of `shape`.
    pub fn from_vec<T: Element>(
        context: &Arc<LaunchContext>,
        shape: &[usize],
        data: Vec<T>,
    ) -> NdResult<Self> {
        Self::from_slice_ordered(context, Order::C, shape, &data)
    }

    /// Array whose buffer is `data` laid out contiguously in `order`.
    pub fn from_slice_ordered<T: Element>(
        context: &Arc<LaunchContext>,
        order: Order,
        shape: &[usize],
        data: &[T],
    ) -> NdResult<Self> {
        let descriptor = ShapeDescriptor::new(T::DATA_TYPE, order, shape)?;
        if descriptor.length() != data.len() {
            return Err(NdError::invalid_argument(
                "NDArray::from_vec",
                format!(
                    "shape {:?} needs {} elements, got {}",
                    shape,
                    descriptor.length(),
                    data.len()
                ),
            ));
        }
        let size = T::DATA_TYPE.size_of_element();
        let mut bytes = vec![0u8; data.len() * size];
        for (chunk, value) in bytes.chunks_exact_mut(size).zip(data) {
            value.write_to(chunk);
        }
        let buffer = if bytes.is_empty() {
            DataBuffer::empty(T::DATA_TYPE, context)
        } else {
            DataBuffer::from_bytes(&bytes, T::DATA_TYPE, context)?
        };
        Ok(Self::from_parts(
            context,
            Arc::new(buffer),
            &descriptor,
            0,
            false,
        ))
    }

    /// Array of any numeric type from `f64` values given in `order` layout.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray, Order};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_values(&ctx, Order::C, &[3], &[1.9, -2.5, 3.0], DataType::Int32).unwrap();
    /// assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, -2, 3]);
    /// ```
    pub fn from_values(
        context: &Arc<LaunchContext>,
        order: Order,
        shape: &[usize],
        values: &[f64],
        dtype: DataType,
    ) -> NdResult<Self> {
        let descriptor = ShapeDescriptor::new(dtype, order, shape)?;
        if descriptor.length() != values.len() {
            return Err(NdError::invalid_argument(
                "NDArray::from_values",
                format!(
                    "shape {:?} needs {} elements, got {}",
                    shape,
                    descriptor.length(),
                    values.len()
                ),
            ));
        }
        let array = Self::with_descriptor(context, &descriptor)?;
        let size = dtype.size_of_element();
        array.buffer.write_primary_with(|bytes| {
            for (chunk, &value) in bytes.chunks_exact_mut(size).zip(values) {
                write_scalar(dtype, chunk, Scalar::Float(value))?;
            }
            Ok::<(), NdError>(())
        })?;
        Ok(array)
    }

    /// Rank 0 array holding `value`.
    pub fn scalar<T: Element>(context: &Arc<LaunchContext>, value: T) -> NdResult<Self> {
        Self::from_slice_ordered(context, Order::C, &[], &[value])
    }

    /// Rank 0 array of `dtype` holding `value` cast to that type.
    pub fn scalar_of(
        context: &Arc<LaunchContext>,
        value: impl Into<Scalar>,
        dtype: DataType,
    ) -> NdResult<Self> {
        Self::value_of(context, &[], value, dtype)
    }

    /// Row-major array of `shape` with every element set to `value`.
    pub fn value_of(
        context: &Arc<LaunchContext>,
        shape: &[usize],
        value: impl Into<Scalar>,
        dtype: DataType,
    ) -> NdResult<Self> {
        let mut array = Self::zeros(context, shape, dtype)?;
        array.assign_scalar(value)?;
        Ok(array)
    }

    /// Rank 0 array with no elements.
    pub fn empty(context: &Arc<LaunchContext>, dtype: DataType) -> Self {
        Self::from_parts(
            context,
            Arc::new(DataBuffer::empty(dtype, context)),
            &ShapeDescriptor::empty(dtype),
            0,
            false,
        )
    }

    /// View `descriptor` over an existing buffer starting at element `offset`.
    ///
    /// The array counts as a view when it does not cover the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::TypeMismatch`] when the descriptor and buffer data
    /// types differ, and [`NdError::SizeMismatch`] when the layout would
    /// address elements past the end of the buffer.
    pub fn from_buffer(
        context: &Arc<LaunchContext>,
        buffer: Arc<DataBuffer>,
        descriptor: &ShapeDescriptor,
        offset: usize,
    ) -> NdResult<Self> {
        if descriptor.data_type() != buffer.data_type() {
            return Err(NdError::type_mismatch(
                "NDArray::from_buffer",
                descriptor.data_type(),
                buffer.data_type(),
            ));
        }
        let size = descriptor.data_type().size_of_element();
        if !descriptor.data_type().is_s() && !descriptor.is_empty() {
            let required = (offset + descriptor.span()) * size;
            if required > buffer.len_bytes() {
                return Err(NdError::size_mismatch(
                    "NDArray::from_buffer",
                    required,
                    buffer.len_bytes(),
                ));
            }
        }
        let is_view = offset > 0 || descriptor.length() * size < buffer.len_bytes();
        let is_view = is_view && !descriptor.data_type().is_s();
        Ok(Self::from_parts(context, buffer, descriptor, offset, is_view))
    }

    /// Wrap caller memory laid out as `descriptor`, without copying.
    ///
    /// # Safety
    ///
    /// See [`DataBuffer::from_external`]. `ptr` must address at least
    /// `descriptor.span()` elements.
    pub unsafe fn from_raw_parts(
        context: &Arc<LaunchContext>,
        ptr: NonNull<u8>,
        descriptor: &ShapeDescriptor,
        owner: bool,
    ) -> Self {
        let len_bytes = descriptor.span() * descriptor.data_type().size_of_element();
        let buffer = DataBuffer::from_external(ptr, len_bytes, descriptor.data_type(), owner, context);
        Self::from_parts(context, Arc::new(buffer), descriptor, 0, false)
    }

    /// Move the contents out, leaving an empty array of the same type behind.
    pub fn take(&mut self) -> NDArray {
        let empty = NDArray::empty(&self.context, self.dtype);
        std::mem::replace(self, empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_length() {
        let ctx = LaunchContext::host();
        assert!(NDArray::from_vec(&ctx, &[2, 2], vec![1i32, 2, 3]).is_err());
        let a = NDArray::from_vec(&ctx, &[2, 2], vec![1i32, 2, 3, 4]).unwrap();
        assert!(!a.is_view());
        assert_eq!(a.e::<i32>(3).unwrap(), 4);
    }

    #[test]
    fn test_f_ordered_data() {
        let ctx = LaunchContext::host();
        let a = NDArray::from_slice_ordered(&ctx, Order::F, &[2, 3], &[1u8, 2, 3, 4, 5, 6]).unwrap();
        // column-major buffer: logical row 0 is 1, 3, 5
        assert_eq!(a.to_vec::<u8>().unwrap(), vec![1, 3, 5, 2, 4, 6]);
    }

    #[test]
    fn test_value_of_and_scalar_of() {
        let ctx = LaunchContext::host();
        let a = NDArray::value_of(&ctx, &[2, 2], 7.5, DataType::Half).unwrap();
        assert!(a.to_scalars().unwrap().iter().all(|v| *v == Scalar::Float(7.5)));
        let s = NDArray::scalar_of(&ctx, 3u8, DataType::Double).unwrap();
        assert_eq!(s.e::<f64>(0).unwrap(), 3.0);
    }

    #[test]
    fn test_from_buffer_marks_partial_views() {
        let ctx = LaunchContext::host();
        let base = NDArray::from_vec(&ctx, &[6], vec![0f32, 1., 2., 3., 4., 5.]).unwrap();
        let d = ShapeDescriptor::new(DataType::Float32, Order::C, &[2]).unwrap();
        let v = NDArray::from_buffer(&ctx, Arc::clone(base.data_buffer()), &d, 4).unwrap();
        assert!(v.is_view());
        assert_eq!(v.to_vec::<f32>().unwrap(), vec![4.0, 5.0]);
        assert!(NDArray::from_buffer(&ctx, Arc::clone(base.data_buffer()), &d, 5).is_err());
    }

    #[test]
    fn test_from_buffer_rejects_foreign_data_type() {
        let ctx = LaunchContext::host();
        let bytes: Vec<u8> = (0..8).collect();
        let buffer = Arc::new(DataBuffer::from_bytes(&bytes, DataType::Int8, &ctx).unwrap());
        let d = ShapeDescriptor::new(DataType::Int16, Order::C, &[2]).unwrap();
        assert!(matches!(
            NDArray::from_buffer(&ctx, buffer, &d, 1),
            Err(NdError::TypeMismatch {
                requested: DataType::Int16,
                actual: DataType::Int8,
                ..
            })
        ));
    }

    #[test]
    fn test_with_descriptor_zero_fills_strided_layouts() {
        let ctx = LaunchContext::host();
        let d = ShapeDescriptor::new(DataType::Int32, Order::F, &[3, 2]).unwrap();
        let a = NDArray::with_descriptor(&ctx, &d).unwrap();
        assert_eq!(a.strides(), &[1, 3]);
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![0; 6]);
    }

    #[test]
    fn test_raw_parts_wraps_without_copy() {
        let ctx = LaunchContext::host();
        let boxed: Box<[u8]> = vec![0u8; 8].into_boxed_slice();
        let ptr = NonNull::new(Box::into_raw(boxed) as *mut u8).unwrap();
        let d = ShapeDescriptor::new(DataType::Int32, Order::C, &[2]).unwrap();
        let mut a = unsafe { NDArray::from_raw_parts(&ctx, ptr, &d, true) };
        a.p(1, 42i32).unwrap();
        assert_eq!(a.e::<i32>(1).unwrap(), 42);
        assert!(a.data_buffer().is_owner());
        assert_eq!(ctx.memory_counter().allocated_group(crate::buffer::MemoryGroup::Host), 0);
    }

    #[test]
    fn test_take_leaves_empty() {
        let ctx = LaunchContext::host();
        let mut a = NDArray::zeros(&ctx, &[3], DataType::Int8).unwrap();
        let moved = a.take();
        assert!(a.is_empty());
        assert_eq!(a.data_type(), DataType::Int8);
        assert_eq!(moved.length_of(), 3);
    }

    #[test]
    fn test_string_types_need_dedicated_constructor() {
        let ctx = LaunchContext::host();
        assert!(matches!(
            NDArray::zeros(&ctx, &[2], DataType::Utf8),
            Err(NdError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_allocation_limit_surfaces() {
        let ctx = LaunchContext::new(crate::RuntimeConfig::default().with_host_memory_limit(64))
            .unwrap();
        assert!(NDArray::zeros(&ctx, &[8], DataType::Double).is_ok());
        assert!(matches!(
            NDArray::zeros(&ctx, &[8], DataType::Double),
            Err(NdError::Allocation { .. })
        ));
    }
}
