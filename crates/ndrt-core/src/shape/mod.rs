//! Shape descriptors, their flat encoding and the interning cache.
//!
//! This module is organized into submodules:
//! - `descriptor`: [`ShapeDescriptor`] and pure derived-shape helpers
//! - `encoding`: the `[rank, extents.., strides.., extra, ews, order]` form
//! - `cache`: [`ShapeCache`] and [`ConstantShapeBuffer`]
//! - `iter`: [`OffsetIter`] for strided traversal

mod cache;
mod descriptor;
mod encoding;
mod iter;

pub use cache::{ConstantShapeBuffer, ShapeCache};
pub use descriptor::{broadcast_shapes, contiguous_strides, ShapeDescriptor};
pub use encoding::{decode_shape_info, encode_shape_info, shape_info_length};
pub use iter::OffsetIter;
