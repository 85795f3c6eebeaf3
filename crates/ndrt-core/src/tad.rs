//! Tensor-along-dimension (TAD) decomposition
//!
//! A TAD pack splits an array into equally shaped sub-arrays. The caller
//! names the axes to *exclude*: the sub-arrays span every other axis, and
//! one sub-array exists per combination of indices along the excluded axes.
//! Offsets are listed in row-major order of those excluded indices.
//!
//! # Examples
//!
//! ```
//! use ndrt_core::{DataType, Order, ShapeDescriptor};
//! use ndrt_core::tad::compute_tad;
//!
//! let desc = ShapeDescriptor::new(DataType::Float32, Order::C, &[2, 3, 4]).unwrap();
//! let pack = compute_tad(&desc, &[1], false).unwrap();
//!
//! assert_eq!(pack.sub_shape().extents(), &[2, 4]);
//! assert_eq!(pack.sub_shape().strides(), &[12, 1]);
//! assert_eq!(pack.offsets(), &[0, 4, 8]);
//! ```

use crate::error::{NdError, NdResult};
use crate::shape::{OffsetIter, ShapeDescriptor};
use crate::types::Shape;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Cache key of a TAD pack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TadDescriptor {
    shape: ShapeDescriptor,
    dims_to_exclude: Shape,
    keep_unities: bool,
}

impl TadDescriptor {
    pub fn new(shape: &ShapeDescriptor, dims_to_exclude: &[usize], keep_unities: bool) -> Self {
        Self {
            shape: shape.clone(),
            dims_to_exclude: Shape::from_slice(dims_to_exclude),
            keep_unities,
        }
    }

    pub fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    pub fn dims_to_exclude(&self) -> &[usize] {
        &self.dims_to_exclude
    }

    pub fn keep_unities(&self) -> bool {
        self.keep_unities
    }
}

/// Shape shared by all sub-arrays plus each sub-array's element offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TadPack {
    sub_shape: ShapeDescriptor,
    offsets: Vec<usize>,
}

impl TadPack {
    pub fn sub_shape(&self) -> &ShapeDescriptor {
        &self.sub_shape
    }

    /// Offsets relative to the parent's first element.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn number_of_tads(&self) -> usize {
        self.offsets.len()
    }

    /// Elements per sub-array.
    pub fn sub_length(&self) -> usize {
        self.sub_shape.length()
    }
}

/// Check that `dims` is strictly ascending and within `0..rank`.
///
/// # Errors
///
/// [`NdError::UnsortedDimensions`] for unsorted or repeated axes and
/// [`NdError::InvalidDimensions`] for axes outside the rank.
pub fn validate_dimensions(rank: usize, dims: &[usize]) -> NdResult<()> {
    if dims.windows(2).any(|w| w[0] >= w[1]) {
        return Err(NdError::UnsortedDimensions {
            dims: dims.to_vec(),
        });
    }
    if let Some(&bad) = dims.iter().find(|&&d| d >= rank) {
        return Err(NdError::invalid_dimensions(
            dims,
            rank,
            format!("axis {bad} is out of range"),
        ));
    }
    Ok(())
}

/// Axes of `0..rank` not contained in `dims`, ascending.
///
/// # Examples
///
/// ```
/// use ndrt_core::tad::complement_dims;
///
/// assert_eq!(complement_dims(4, &[3, 1]).as_slice(), &[0, 2]);
/// ```
pub fn complement_dims(rank: usize, dims: &[usize]) -> Shape {
    (0..rank).filter(|axis| !dims.contains(axis)).collect()
}

fn offset_at(mut index: usize, extents: &[usize], strides: &[usize]) -> usize {
    let mut offset = 0;
    for d in (0..extents.len()).rev() {
        offset += (index % extents[d]) * strides[d];
        index /= extents[d];
    }
    offset
}

/// Decompose `desc` into sub-arrays spanning every axis not in `dims_to_exclude`.
///
/// With `keep_unities` the excluded axes stay in the sub-shape as unit axes.
/// An empty exclusion list, or one naming every axis, yields a single
/// sub-array equal to the whole array at offset 0.
///
/// # Errors
///
/// See [`validate_dimensions`].
pub fn compute_tad(
    desc: &ShapeDescriptor,
    dims_to_exclude: &[usize],
    keep_unities: bool,
) -> NdResult<TadPack> {
    compute_tad_with_threshold(desc, dims_to_exclude, keep_unities, usize::MAX)
}

pub(crate) fn compute_tad_with_threshold(
    desc: &ShapeDescriptor,
    dims_to_exclude: &[usize],
    keep_unities: bool,
    parallel_threshold: usize,
) -> NdResult<TadPack> {
    let rank = desc.rank();
    validate_dimensions(rank, dims_to_exclude)?;
    if dims_to_exclude.is_empty() || dims_to_exclude.len() == rank {
        return Ok(TadPack {
            sub_shape: desc.clone(),
            offsets: vec![0],
        });
    }

    let mut sub_extents = Shape::new();
    let mut sub_strides = Shape::new();
    let mut outer_extents = Shape::new();
    let mut outer_strides = Shape::new();
    for (axis, (&extent, &stride)) in desc.extents().iter().zip(desc.strides()).enumerate() {
        if dims_to_exclude.contains(&axis) {
            outer_extents.push(extent);
            outer_strides.push(stride);
            if keep_unities {
                sub_extents.push(1);
                sub_strides.push(stride);
            }
        } else {
            sub_extents.push(extent);
            sub_strides.push(stride);
        }
    }
    let sub_shape =
        ShapeDescriptor::from_parts(desc.data_type(), desc.order(), sub_extents, sub_strides);

    let count: usize = outer_extents.iter().product();
    let offsets = if count >= parallel_threshold {
        parallel_offsets(count, &outer_extents, &outer_strides)
    } else {
        OffsetIter::new(&outer_extents, &outer_strides).collect()
    };

    Ok(TadPack { sub_shape, offsets })
}

#[cfg(feature = "parallel")]
fn parallel_offsets(count: usize, extents: &[usize], strides: &[usize]) -> Vec<usize> {
    (0..count)
        .into_par_iter()
        .map(|k| offset_at(k, extents, strides))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn parallel_offsets(count: usize, extents: &[usize], strides: &[usize]) -> Vec<usize> {
    (0..count).map(|k| offset_at(k, extents, strides)).collect()
}

/// Memoizes TAD packs by [`TadDescriptor`].
///
/// # Examples
///
/// ```
/// use ndrt_core::{DataType, Order, ShapeDescriptor};
/// use ndrt_core::tad::{TadCache, TadDescriptor};
///
/// let cache = TadCache::new();
/// let desc = ShapeDescriptor::new(DataType::Int32, Order::C, &[4, 5]).unwrap();
/// let key = TadDescriptor::new(&desc, &[0], false);
///
/// let first = cache.get_or_compute(&key).unwrap();
/// let second = cache.get_or_compute(&key).unwrap();
/// assert_eq!(first.number_of_tads(), 4);
/// assert_eq!(cache.hits(), 1);
/// assert_eq!(cache.misses(), 1);
/// # drop(second);
/// ```
#[derive(Debug)]
pub struct TadCache {
    packs: Mutex<HashMap<TadDescriptor, Arc<TadPack>>>,
    parallel_threshold: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for TadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TadCache {
    pub fn new() -> Self {
        Self::with_parallel_threshold(usize::MAX)
    }

    pub fn with_parallel_threshold(parallel_threshold: usize) -> Self {
        Self {
            packs: Mutex::new(HashMap::new()),
            parallel_threshold,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get_or_compute(&self, key: &TadDescriptor) -> NdResult<Arc<TadPack>> {
        if let Some(pack) = self.packs.lock().get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(pack));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let pack = Arc::new(compute_tad_with_threshold(
            &key.shape,
            &key.dims_to_exclude,
            key.keep_unities,
            self.parallel_threshold,
        )?);
        tracing::debug!(
            rank = key.shape.rank(),
            tads = pack.number_of_tads(),
            "cached new TAD pack"
        );
        let mut packs = self.packs.lock();
        Ok(Arc::clone(packs.entry(key.clone()).or_insert(pack)))
    }

    pub fn len(&self) -> usize {
        self.packs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.packs.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Order};
    use std::collections::BTreeSet;

    fn desc(extents: &[usize]) -> ShapeDescriptor {
        ShapeDescriptor::new(DataType::Double, Order::C, extents).unwrap()
    }

    fn covered_offsets(d: &ShapeDescriptor, pack: &TadPack) -> Vec<usize> {
        let mut all = Vec::new();
        for &base in pack.offsets() {
            all.extend(OffsetIter::from_descriptor(pack.sub_shape()).map(|o| base + o));
        }
        all.sort_unstable();
        assert_eq!(all.len(), d.length());
        all
    }

    #[test]
    fn test_matrix_rows_and_columns() {
        let d = desc(&[3, 4]);
        let rows = compute_tad(&d, &[0], false).unwrap();
        assert_eq!(rows.sub_shape().extents(), &[4]);
        assert_eq!(rows.offsets(), &[0, 4, 8]);

        let cols = compute_tad(&d, &[1], false).unwrap();
        assert_eq!(cols.sub_shape().extents(), &[3]);
        assert_eq!(cols.sub_shape().strides(), &[4]);
        assert_eq!(cols.sub_shape().ews(), 4);
        assert_eq!(cols.offsets(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_keep_unities() {
        let pack = compute_tad(&desc(&[2, 3, 4]), &[0, 2], true).unwrap();
        assert_eq!(pack.sub_shape().extents(), &[1, 3, 1]);
        assert_eq!(pack.number_of_tads(), 8);
        assert_eq!(pack.sub_length(), 3);
    }

    #[test]
    fn test_whole_array_cases() {
        let d = desc(&[2, 3]);
        for dims in [&[][..], &[0, 1][..]] {
            let pack = compute_tad(&d, dims, false).unwrap();
            assert_eq!(pack.offsets(), &[0]);
            assert_eq!(pack.sub_shape(), &d);
        }
    }

    #[test]
    fn test_rejects_unsorted_and_out_of_range() {
        let d = desc(&[2, 3, 4]);
        assert!(matches!(
            compute_tad(&d, &[2, 1], false),
            Err(NdError::UnsortedDimensions { .. })
        ));
        assert!(matches!(
            compute_tad(&d, &[1, 1], false),
            Err(NdError::UnsortedDimensions { .. })
        ));
        assert!(matches!(
            compute_tad(&d, &[3], false),
            Err(NdError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_partition_covers_each_element_once() {
        let d = desc(&[2, 3, 4, 5]);
        for dims in [&[0][..], &[1, 3][..], &[0, 1, 2][..]] {
            let pack = compute_tad(&d, dims, false).unwrap();
            let all = covered_offsets(&d, &pack);
            assert_eq!(all, (0..d.length()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_f_order_parent() {
        let d = ShapeDescriptor::new(DataType::Float32, Order::F, &[3, 4]).unwrap();
        let pack = compute_tad(&d, &[0], false).unwrap();
        assert_eq!(pack.offsets(), &[0, 1, 2]);
        assert_eq!(pack.sub_shape().strides(), &[3]);
        let set: BTreeSet<usize> = covered_offsets(&d, &pack).into_iter().collect();
        assert_eq!(set.len(), 12);
    }

    #[test]
    fn test_parallel_threshold_gives_same_offsets() {
        let d = desc(&[6, 5, 4]);
        let serial = compute_tad(&d, &[0, 2], false).unwrap();
        let parallel = compute_tad_with_threshold(&d, &[0, 2], false, 1).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_cache_distinguishes_keep_unities() {
        let cache = TadCache::new();
        let d = desc(&[2, 3]);
        let a = cache.get_or_compute(&TadDescriptor::new(&d, &[0], false)).unwrap();
        let b = cache.get_or_compute(&TadDescriptor::new(&d, &[0], true)).unwrap();
        assert_ne!(a.sub_shape().rank(), b.sub_shape().rank());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
