//! Flat integer encoding of shape descriptors.
//!
//! Layout: `[rank, extents.., strides.., extra, ews, order]` where `extra`
//! packs the data type code in the low byte and the array kind above it,
//! and `order` is the ASCII code of `'c'` or `'f'`. This is the form kernels
//! receive and the form the shape cache keeps on both host and device.

use crate::error::{NdError, NdResult};
use crate::shape::ShapeDescriptor;
use crate::types::{ArrayKind, DataType, Order, Shape, MAX_RANK};

/// Number of integers in an encoded descriptor of the given rank.
pub fn shape_info_length(rank: usize) -> usize {
    2 * rank + 4
}

/// Encode a descriptor.
///
/// # Examples
///
/// ```
/// use ndrt_core::{DataType, Order, ShapeDescriptor};
/// use ndrt_core::shape::{decode_shape_info, encode_shape_info};
///
/// let desc = ShapeDescriptor::new(DataType::Int64, Order::C, &[2, 3]).unwrap();
/// let info = encode_shape_info(&desc);
/// assert_eq!(&info[..5], &[2, 2, 3, 3, 1]);
/// assert_eq!(decode_shape_info(&info).unwrap(), desc);
/// ```
pub fn encode_shape_info(desc: &ShapeDescriptor) -> Vec<i64> {
    let rank = desc.rank();
    let mut info = Vec::with_capacity(shape_info_length(rank));
    info.push(rank as i64);
    info.extend(desc.extents().iter().map(|&e| e as i64));
    info.extend(desc.strides().iter().map(|&s| s as i64));
    info.push(i64::from(desc.data_type().code()) | (desc.kind().bits() << 8));
    info.push(desc.ews() as i64);
    info.push(desc.order().as_char() as i64);
    info
}

/// Decode an encoded descriptor.
///
/// # Errors
///
/// Returns [`NdError::InvalidArgument`] when the buffer is truncated or any
/// field is out of range.
pub fn decode_shape_info(info: &[i64]) -> NdResult<ShapeDescriptor> {
    let invalid = |message: String| NdError::invalid_argument("decode_shape_info", message);

    let rank = *info
        .first()
        .ok_or_else(|| invalid("empty shape info".into()))?;
    if rank < 0 || rank as usize > MAX_RANK {
        return Err(invalid(format!("rank {rank} is out of range")));
    }
    let rank = rank as usize;
    if info.len() < shape_info_length(rank) {
        return Err(invalid(format!(
            "expected {} entries for rank {}, got {}",
            shape_info_length(rank),
            rank,
            info.len()
        )));
    }

    let to_usize = |v: i64| -> NdResult<usize> {
        usize::try_from(v).map_err(|_| invalid(format!("negative extent or stride {v}")))
    };
    let extents = info[1..=rank]
        .iter()
        .map(|&v| to_usize(v))
        .collect::<NdResult<Shape>>()?;
    let strides = info[rank + 1..=2 * rank]
        .iter()
        .map(|&v| to_usize(v))
        .collect::<NdResult<Shape>>()?;

    let extra = info[2 * rank + 1];
    let dtype = DataType::from_code((extra & 0xff) as u8)
        .ok_or_else(|| invalid(format!("unknown data type code {}", extra & 0xff)))?;
    let kind = ArrayKind::from_bits(extra >> 8)
        .ok_or_else(|| invalid(format!("unknown array kind {}", extra >> 8)))?;
    let ews = to_usize(info[2 * rank + 2])?;
    let order = u8::try_from(info[2 * rank + 3])
        .ok()
        .and_then(|c| Order::from_char(c as char))
        .ok_or_else(|| invalid(format!("unknown order {}", info[2 * rank + 3])))?;

    Ok(ShapeDescriptor::from_raw(
        dtype, order, extents, strides, ews, kind,
    ))
}
