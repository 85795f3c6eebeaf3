//! Element access by logical index and by coordinates.
//!
//! The strict accessors ([`NDArray::e`], [`NDArray::t`], [`NDArray::p`],
//! [`NDArray::r`]) require the requested Rust type to match the array's data
//! type exactly. The converting accessors go through [`Scalar`] and cast.

use crate::array::NDArray;
use crate::element::{read_scalar, write_scalar, Element};
use crate::error::{NdError, NdResult};
use crate::shape::OffsetIter;
use crate::types::Scalar;
use parking_lot::MappedRwLockWriteGuard;

fn element_bytes(bytes: &[u8], element: usize, size: usize) -> NdResult<&[u8]> {
    let start = element * size;
    bytes
        .get(start..start + size)
        .ok_or_else(|| NdError::size_mismatch("element read", start + size, bytes.len()))
}

fn element_bytes_mut(bytes: &mut [u8], element: usize, size: usize) -> NdResult<&mut [u8]> {
    let start = element * size;
    let available = bytes.len();
    bytes
        .get_mut(start..start + size)
        .ok_or_else(|| NdError::size_mismatch("element write", start + size, available))
}

impl NDArray {
    /// Buffer element offset of the `index`-th logical element.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::IndexOutOfBounds`] when `index >= length_of()`.
    pub fn physical_offset(&self, index: usize) -> NdResult<usize> {
        if index >= self.length {
            return Err(NdError::out_of_bounds(&[index], &[self.length]));
        }
        Ok(self.offset + self.descriptor().offset_of_index(index))
    }

    fn coords_offset(&self, coords: &[usize]) -> NdResult<usize> {
        if self.is_empty() {
            return Err(NdError::out_of_bounds(coords, self.shape()));
        }
        self.descriptor().check_coords(coords)?;
        Ok(self.offset + self.descriptor().offset_of_coords(coords))
    }

    fn check_type<T: Element>(&self, operation: &str) -> NdResult<()> {
        if T::DATA_TYPE != self.dtype {
            return Err(NdError::type_mismatch(operation, T::DATA_TYPE, self.dtype));
        }
        Ok(())
    }

    fn read_at<T: Element>(&self, element: usize) -> NdResult<T> {
        let size = self.size_of_t();
        self.buffer
            .read_primary_with(|bytes| element_bytes(bytes, element, size).map(T::read_from))
    }

    fn write_at<T: Element>(&self, element: usize, value: T) -> NdResult<()> {
        let size = self.size_of_t();
        self.buffer.write_primary_with(|bytes| {
            value.write_to(element_bytes_mut(bytes, element, size)?);
            Ok(())
        })
    }

    /// Element at logical (row-major) `index`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::TypeMismatch`] unless `T` is exactly the array's
    /// data type, and [`NdError::IndexOutOfBounds`] past the end.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2, 2], vec![1i64, 2, 3, 4]).unwrap();
    /// assert_eq!(a.e::<i64>(2).unwrap(), 3);
    /// assert!(a.e::<i32>(2).is_err());
    /// assert!(a.e::<i64>(4).is_err());
    /// ```
    pub fn e<T: Element>(&self, index: usize) -> NdResult<T> {
        self.check_type::<T>("e")?;
        let element = self.physical_offset(index)?;
        self.read_at(element)
    }

    /// Element at a multi-index.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::RankMismatch`] when `coords.len()` differs from the
    /// rank, plus the errors of [`NDArray::e`].
    pub fn t<T: Element>(&self, coords: &[usize]) -> NdResult<T> {
        self.check_type::<T>("t")?;
        let element = self.coords_offset(coords)?;
        self.read_at(element)
    }

    /// Store `value` at logical `index`.
    pub fn p<T: Element>(&mut self, index: usize, value: T) -> NdResult<()> {
        self.check_type::<T>("p")?;
        let element = self.physical_offset(index)?;
        self.write_at(element, value)
    }

    /// Store `value` at a multi-index.
    pub fn p_at<T: Element>(&mut self, coords: &[usize], value: T) -> NdResult<()> {
        self.check_type::<T>("p_at")?;
        let element = self.coords_offset(coords)?;
        self.write_at(element, value)
    }

    /// Mutable reference to the element at `coords`.
    ///
    /// The returned guard holds the buffer's write lock; drop it before
    /// touching any array sharing the same buffer.
    ///
    /// # Errors
    ///
    /// Besides the errors of [`NDArray::t`], fails with
    /// [`NdError::InvalidArgument`] when wrapped external memory is not
    /// aligned for `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let mut a = NDArray::zeros(&ctx, &[2, 2], DataType::Float32).unwrap();
    /// *a.r::<f32>(&[1, 0]).unwrap() += 2.5;
    /// assert_eq!(a.e::<f32>(2).unwrap(), 2.5);
    /// ```
    pub fn r<T: Element + bytemuck::Pod>(
        &mut self,
        coords: &[usize],
    ) -> NdResult<MappedRwLockWriteGuard<'_, T>> {
        self.check_type::<T>("r")?;
        let element = self.coords_offset(coords)?;
        let size = self.size_of_t();
        let start = element * size;
        let guard = self.buffer.primary_guard_mut();
        MappedRwLockWriteGuard::try_map(guard, |bytes| {
            bytes
                .get_mut(start..start + size)
                .and_then(|b| bytemuck::try_from_bytes_mut::<T>(b).ok())
        })
        .map_err(|_| {
            NdError::invalid_argument("r", "element is out of range or not aligned for the type")
        })
    }

    /// Element at logical `index` as a [`Scalar`].
    pub fn get_scalar(&self, index: usize) -> NdResult<Scalar> {
        let element = self.physical_offset(index)?;
        let (dtype, size) = (self.dtype, self.size_of_t());
        self.buffer
            .read_primary_with(|bytes| read_scalar(dtype, element_bytes(bytes, element, size)?))
    }

    /// Store `value` at logical `index`, cast to the array's data type.
    pub fn set_scalar(&mut self, index: usize, value: impl Into<Scalar>) -> NdResult<()> {
        let element = self.physical_offset(index)?;
        let (dtype, size, value) = (self.dtype, self.size_of_t(), value.into());
        self.buffer.write_primary_with(|bytes| {
            write_scalar(dtype, element_bytes_mut(bytes, element, size)?, value)
        })
    }

    /// Element at logical `index` converted to `T` whatever the data type.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_vec(&ctx, &[2], vec![1.75f32, -3.5]).unwrap();
    /// assert_eq!(a.e_cast::<i32>(1).unwrap(), -3);
    /// assert_eq!(a.e_cast::<f64>(0).unwrap(), 1.75);
    /// ```
    pub fn e_cast<T: Element>(&self, index: usize) -> NdResult<T> {
        self.get_scalar(index).map(T::from_scalar)
    }

    /// All elements in logical order.
    pub fn to_vec<T: Element>(&self) -> NdResult<Vec<T>> {
        self.check_type::<T>("to_vec")?;
        let size = self.size_of_t();
        let base = self.offset;
        self.buffer.read_primary_with(|bytes| {
            OffsetIter::from_descriptor(self.descriptor())
                .map(|off| element_bytes(bytes, base + off, size).map(T::read_from))
                .collect()
        })
    }

    /// All elements in logical order as [`Scalar`]s.
    pub fn to_scalars(&self) -> NdResult<Vec<Scalar>> {
        self.gather_scalars(OffsetIter::from_descriptor(self.descriptor()))
    }

    /// All elements in logical order converted to `f64`.
    pub fn as_f64_vec(&self) -> NdResult<Vec<f64>> {
        Ok(self.to_scalars()?.into_iter().map(Scalar::to_f64).collect())
    }

    /// Read elements at offsets relative to this array's first element.
    pub(crate) fn gather_scalars(
        &self,
        offsets: impl IntoIterator<Item = usize>,
    ) -> NdResult<Vec<Scalar>> {
        if self.dtype.is_s() {
            return Err(NdError::unsupported("numeric read", self.dtype));
        }
        let (dtype, size, base) = (self.dtype, self.size_of_t(), self.offset);
        self.buffer.read_primary_with(|bytes| {
            offsets
                .into_iter()
                .map(|off| read_scalar(dtype, element_bytes(bytes, base + off, size)?))
                .collect()
        })
    }

    /// Write `values` at offsets relative to this array's first element.
    pub(crate) fn scatter_scalars(
        &self,
        offsets: impl IntoIterator<Item = usize>,
        values: impl IntoIterator<Item = Scalar>,
    ) -> NdResult<()> {
        if self.dtype.is_s() {
            return Err(NdError::unsupported("numeric write", self.dtype));
        }
        let (dtype, size, base) = (self.dtype, self.size_of_t(), self.offset);
        self.buffer.write_primary_with(|bytes| {
            for (off, value) in offsets.into_iter().zip(values) {
                write_scalar(dtype, element_bytes_mut(bytes, base + off, size)?, value)?;
            }
            Ok(())
        })
    }

    /// Write `values` in logical order.
    pub(crate) fn write_scalars(&self, values: impl IntoIterator<Item = Scalar>) -> NdResult<()> {
        self.scatter_scalars(OffsetIter::from_descriptor(self.descriptor()), values)
    }

    /// Set every element to `value`.
    pub(crate) fn fill_scalar(&self, value: Scalar) -> NdResult<()> {
        self.write_scalars(std::iter::repeat(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{DataType, Order, Scalar};
    use crate::{LaunchContext, NDArray, NdError};

    #[test]
    fn test_strict_type_and_bounds() {
        let ctx = LaunchContext::host();
        let mut a = NDArray::zeros(&ctx, &[2, 3], DataType::Int16).unwrap();
        a.p_at(&[1, 2], 9i16).unwrap();
        assert_eq!(a.e::<i16>(5).unwrap(), 9);
        assert!(matches!(a.e::<f32>(0), Err(NdError::TypeMismatch { .. })));
        assert!(matches!(a.t::<i16>(&[2, 0]), Err(NdError::IndexOutOfBounds { .. })));
        assert!(matches!(a.t::<i16>(&[0]), Err(NdError::RankMismatch { .. })));
        assert!(a.p(6, 1i16).is_err());
    }

    #[test]
    fn test_logical_index_is_row_major_for_f_order() {
        let ctx = LaunchContext::host();
        let mut a = NDArray::new(&ctx, Order::F, &[2, 3], DataType::Int32).unwrap();
        for i in 0..6 {
            a.p(i, i as i32).unwrap();
        }
        assert_eq!(a.t::<i32>(&[1, 0]).unwrap(), 3);
        assert_eq!(a.physical_offset(3).unwrap(), 1);
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_scalar_access_casts() {
        let ctx = LaunchContext::host();
        let mut a = NDArray::zeros(&ctx, &[3], DataType::UInt8).unwrap();
        a.set_scalar(0, 300i32).unwrap();
        a.set_scalar(1, 2.9f64).unwrap();
        a.set_scalar(2, true).unwrap();
        assert_eq!(
            a.to_scalars().unwrap(),
            vec![Scalar::UInt(44), Scalar::UInt(2), Scalar::UInt(1)]
        );
        assert_eq!(a.as_f64_vec().unwrap(), vec![44.0, 2.0, 1.0]);
    }

    #[test]
    fn test_r_guard_writes_through() {
        let ctx = LaunchContext::host();
        let mut a = NDArray::from_vec(&ctx, &[2], vec![1u32, 2]).unwrap();
        {
            let mut slot = a.r::<u32>(&[1]).unwrap();
            *slot = 20;
        }
        assert_eq!(a.to_vec::<u32>().unwrap(), vec![1, 20]);
        assert!(a.r::<i32>(&[0]).is_err());
    }

    #[test]
    fn test_empty_array_access_fails() {
        let ctx = LaunchContext::host();
        let a = NDArray::empty(&ctx, DataType::Double);
        assert!(a.e::<f64>(0).is_err());
        assert!(a.t::<f64>(&[]).is_err());
        assert!(a.to_vec::<f64>().unwrap().is_empty());
    }

    #[test]
    fn test_bool_reads_any_non_zero() {
        let ctx = LaunchContext::host();
        let a = NDArray::from_vec(&ctx, &[2], vec![0u8, 7]).unwrap();
        let b = a.cast(DataType::Bool).unwrap();
        assert_eq!(b.to_vec::<bool>().unwrap(), vec![false, true]);
    }
}
