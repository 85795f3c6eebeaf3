//! String arrays.
//!
//! A string buffer starts with `n + 1` little-endian `u64` byte offsets,
//! followed by the encoded strings back to back. String `k` occupies bytes
//! `offsets[k]..offsets[k + 1]` of the buffer. UTF-16 and UTF-32 data is
//! stored as little-endian code units.

use crate::array::NDArray;
use crate::buffer::DataBuffer;
use crate::context::LaunchContext;
use crate::error::{NdError, NdResult};
use crate::shape::ShapeDescriptor;
use crate::types::{DataType, Order};
use std::sync::Arc;

const OFFSET_WIDTH: usize = std::mem::size_of::<u64>();

fn encode(value: &str, dtype: DataType) -> Vec<u8> {
    match dtype {
        DataType::Utf16 => value.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        DataType::Utf32 => value.chars().flat_map(|c| u32::from(c).to_le_bytes()).collect(),
        _ => value.as_bytes().to_vec(),
    }
}

fn decode(bytes: &[u8], dtype: DataType) -> NdResult<String> {
    let malformed = || NdError::invalid_argument("string_at", format!("malformed {dtype} data"));
    match dtype {
        DataType::Utf16 => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| malformed())
        }
        DataType::Utf32 => bytes
            .chunks_exact(4)
            .map(|c| char::from_u32(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect::<Option<String>>()
            .ok_or_else(malformed),
        _ => String::from_utf8(bytes.to_vec()).map_err(|_| malformed()),
    }
}

fn read_offset(bytes: &[u8], slot: usize) -> NdResult<usize> {
    let start = slot * OFFSET_WIDTH;
    bytes
        .get(start..start + OFFSET_WIDTH)
        .and_then(|b| <[u8; OFFSET_WIDTH]>::try_from(b).ok())
        .map(|b| u64::from_le_bytes(b) as usize)
        .ok_or_else(|| NdError::size_mismatch("string offsets", start + OFFSET_WIDTH, bytes.len()))
}

impl NDArray {
    /// String array of `shape` in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::Unsupported`] for a non-string `dtype` and
    /// [`NdError::InvalidArgument`] when the value count does not match `shape`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray};
    ///
    /// let ctx = LaunchContext::host();
    /// let a = NDArray::from_strings(&ctx, &[2], &["alpha", "βeta"], DataType::Utf16).unwrap();
    /// assert!(a.is_s());
    /// assert_eq!(a.string_at(1).unwrap(), "βeta");
    /// ```
    pub fn from_strings<S: AsRef<str>>(
        context: &Arc<LaunchContext>,
        shape: &[usize],
        values: &[S],
        dtype: DataType,
    ) -> NdResult<NDArray> {
        if !dtype.is_s() {
            return Err(NdError::unsupported("from_strings", dtype));
        }
        let descriptor = ShapeDescriptor::new(dtype, Order::C, shape)?;
        if descriptor.length() != values.len() {
            return Err(NdError::invalid_argument(
                "from_strings",
                format!(
                    "shape {:?} needs {} strings, got {}",
                    shape,
                    descriptor.length(),
                    values.len()
                ),
            ));
        }

        let encoded: Vec<Vec<u8>> = values.iter().map(|v| encode(v.as_ref(), dtype)).collect();
        let header_len = (values.len() + 1) * OFFSET_WIDTH;
        let data_len: usize = encoded.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(header_len + data_len);
        let mut position = header_len;
        bytes.extend_from_slice(&(position as u64).to_le_bytes());
        for value in &encoded {
            position += value.len();
            bytes.extend_from_slice(&(position as u64).to_le_bytes());
        }
        for value in &encoded {
            bytes.extend_from_slice(value);
        }

        let buffer = DataBuffer::from_bytes(&bytes, dtype, context)?;
        Ok(NDArray::from_parts(
            context,
            Arc::new(buffer),
            &descriptor,
            0,
            false,
        ))
    }

    /// Rank 0 string array.
    pub fn string_scalar(
        context: &Arc<LaunchContext>,
        value: &str,
        dtype: DataType,
    ) -> NdResult<NDArray> {
        Self::from_strings(context, &[], &[value], dtype)
    }

    /// String at logical `index`.
    pub fn string_at(&self, index: usize) -> NdResult<String> {
        if !self.dtype.is_s() {
            return Err(NdError::unsupported("string_at", self.dtype));
        }
        let slot = self.physical_offset(index)?;
        let dtype = self.dtype;
        self.buffer.read_primary_with(|bytes| {
            let (start, end) = (read_offset(bytes, slot)?, read_offset(bytes, slot + 1)?);
            let data = bytes
                .get(start..end)
                .ok_or_else(|| NdError::size_mismatch("string_at", end, bytes.len()))?;
            decode(data, dtype)
        })
    }

    /// Every string in logical order.
    pub fn strings(&self) -> NdResult<Vec<String>> {
        (0..self.length).map(|i| self.string_at(i)).collect()
    }
}
