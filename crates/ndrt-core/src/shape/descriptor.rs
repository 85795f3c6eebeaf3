//! Shape descriptors: extents, strides, order, data type, element-wise stride and kind.
//!
//! A [`ShapeDescriptor`] is a plain value. Identical descriptors hash and
//! compare equal, which is what lets the shape cache hand out one shared
//! buffer per distinct shape.

use crate::error::{NdError, NdResult};
use crate::types::{ArrayKind, DataType, Order, Shape, MAX_RANK};
use smallvec::smallvec;

/// Complete description of an array's layout.
///
/// Invariants:
/// - `extents.len() == strides.len()`
/// - rank 0 with kind [`ArrayKind::Scalar`] holds exactly one element
/// - kind [`ArrayKind::Empty`] holds zero elements
///
/// # Examples
///
/// ```
/// use ndrt_core::{DataType, Order, ShapeDescriptor};
///
/// let desc = ShapeDescriptor::new(DataType::Float32, Order::C, &[2, 3, 4]).unwrap();
/// assert_eq!(desc.strides(), &[12, 4, 1]);
/// assert_eq!(desc.length(), 24);
/// assert_eq!(desc.ews(), 1);
///
/// let permuted = desc.permute(&[2, 0, 1]).unwrap();
/// assert_eq!(permuted.extents(), &[4, 2, 3]);
/// assert_eq!(permuted.strides(), &[1, 12, 4]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeDescriptor {
    extents: Shape,
    strides: Shape,
    order: Order,
    dtype: DataType,
    ews: usize,
    kind: ArrayKind,
}

/// Strides of a contiguous array with the given extents and order.
///
/// Zero extents are treated as one so that strides stay non-zero.
///
/// # Examples
///
/// ```
/// use ndrt_core::{Order, shape::contiguous_strides};
///
/// assert_eq!(contiguous_strides(&[2, 3, 4], Order::C).as_slice(), &[12, 4, 1]);
/// assert_eq!(contiguous_strides(&[2, 3, 4], Order::F).as_slice(), &[1, 2, 6]);
/// ```
pub fn contiguous_strides(extents: &[usize], order: Order) -> Shape {
    let mut strides: Shape = smallvec![0; extents.len()];
    let mut acc = 1usize;
    match order {
        Order::C => {
            for i in (0..extents.len()).rev() {
                strides[i] = acc;
                acc *= extents[i].max(1);
            }
        }
        Order::F => {
            for i in 0..extents.len() {
                strides[i] = acc;
                acc *= extents[i].max(1);
            }
        }
    }
    strides
}

/// Broadcast two extent lists numpy style: trailing alignment, equal or one.
///
/// Returns `None` when some aligned pair differs and neither side is 1.
///
/// # Examples
///
/// ```
/// use ndrt_core::shape::broadcast_shapes;
///
/// assert_eq!(broadcast_shapes(&[2, 3], &[3]).unwrap().as_slice(), &[2, 3]);
/// assert_eq!(broadcast_shapes(&[4, 1, 5], &[3, 1]).unwrap().as_slice(), &[4, 3, 5]);
/// assert!(broadcast_shapes(&[2, 3], &[4]).is_none());
/// ```
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Shape> {
    let rank = a.len().max(b.len());
    let mut result: Shape = smallvec![0; rank];
    for i in 0..rank {
        let da = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let db = if i < b.len() { b[b.len() - 1 - i] } else { 1 };
        result[rank - 1 - i] = if da == db {
            da
        } else if da == 1 {
            db
        } else if db == 1 {
            da
        } else {
            return None;
        };
    }
    Some(result)
}

fn other_order(order: Order) -> Order {
    match order {
        Order::C => Order::F,
        Order::F => Order::C,
    }
}

/// Whether the non-unit axes are densely packed in `order`.
fn is_dense_in(extents: &[usize], strides: &[usize], order: Order) -> bool {
    let mut expected = 1usize;
    let mut check = |i: usize| {
        if extents[i] == 1 {
            return true;
        }
        let ok = strides[i] == expected;
        expected *= extents[i];
        ok
    };
    match order {
        Order::C => (0..extents.len()).rev().all(&mut check),
        Order::F => (0..extents.len()).all(&mut check),
    }
}

fn compute_ews(extents: &[usize], strides: &[usize], order: Order) -> usize {
    if extents.contains(&0) {
        return 0;
    }
    if is_dense_in(extents, strides, order) {
        return 1;
    }
    let mut non_unit = extents.iter().zip(strides.iter()).filter(|(e, _)| **e != 1);
    match (non_unit.next(), non_unit.next()) {
        (Some((_, stride)), None) => *stride,
        _ => 0,
    }
}

impl ShapeDescriptor {
    /// Contiguous descriptor for `extents` in `order`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidArgument`] when the rank exceeds [`MAX_RANK`].
    pub fn new(dtype: DataType, order: Order, extents: &[usize]) -> NdResult<Self> {
        let strides = contiguous_strides(extents, order);
        Self::with_strides(dtype, order, extents, &strides)
    }

    /// Descriptor with explicit strides.
    ///
    /// The order is normalized: when the strides are dense in the opposite
    /// order, that order is recorded instead.
    ///
    /// # Errors
    ///
    /// Returns an error when the stride count differs from the rank or the
    /// rank exceeds [`MAX_RANK`].
    pub fn with_strides(
        dtype: DataType,
        order: Order,
        extents: &[usize],
        strides: &[usize],
    ) -> NdResult<Self> {
        if extents.len() > MAX_RANK {
            return Err(NdError::invalid_argument(
                "ShapeDescriptor",
                format!("rank {} exceeds maximum {}", extents.len(), MAX_RANK),
            ));
        }
        if extents.len() != strides.len() {
            return Err(NdError::rank_mismatch(
                "ShapeDescriptor strides",
                extents.len(),
                strides.len(),
            ));
        }
        Ok(Self::from_parts(
            dtype,
            order,
            Shape::from_slice(extents),
            Shape::from_slice(strides),
        ))
    }

    pub(crate) fn from_parts(dtype: DataType, order: Order, extents: Shape, strides: Shape) -> Self {
        let kind = if extents.contains(&0) {
            ArrayKind::Empty
        } else if extents.is_empty() {
            ArrayKind::Scalar
        } else {
            ArrayKind::Ordinary
        };
        let order = if is_dense_in(&extents, &strides, order)
            || !is_dense_in(&extents, &strides, other_order(order))
        {
            order
        } else {
            other_order(order)
        };
        let ews = compute_ews(&extents, &strides, order);
        Self {
            extents,
            strides,
            order,
            dtype,
            ews,
            kind,
        }
    }

    /// Rebuild a descriptor from already validated fields, as decoded from shape info.
    pub(crate) fn from_raw(
        dtype: DataType,
        order: Order,
        extents: Shape,
        strides: Shape,
        ews: usize,
        kind: ArrayKind,
    ) -> Self {
        Self {
            extents,
            strides,
            order,
            dtype,
            ews,
            kind,
        }
    }

    /// Rank 0 descriptor with one element.
    pub fn scalar(dtype: DataType) -> Self {
        Self::from_parts(dtype, Order::C, Shape::new(), Shape::new())
    }

    /// Rank 0 descriptor with no elements.
    pub fn empty(dtype: DataType) -> Self {
        Self {
            extents: Shape::new(),
            strides: Shape::new(),
            order: Order::C,
            dtype,
            ews: 0,
            kind: ArrayKind::Empty,
        }
    }

    pub fn vector(dtype: DataType, length: usize) -> Self {
        Self::from_parts(dtype, Order::C, smallvec![length], smallvec![1])
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn data_type(&self) -> DataType {
        self.dtype
    }

    /// Element-wise stride: 1 for dense layouts, the common stride of a
    /// single non-unit axis, 0 otherwise.
    pub fn ews(&self) -> usize {
        self.ews
    }

    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    /// Number of logical elements.
    pub fn length(&self) -> usize {
        match self.kind {
            ArrayKind::Empty => 0,
            _ => self.extents.iter().product(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ArrayKind::Empty
    }

    /// Dense in its own order.
    pub fn is_contiguous(&self) -> bool {
        !self.is_empty() && is_dense_in(&self.extents, &self.strides, self.order)
    }

    /// Same layout, different element type.
    pub fn with_data_type(&self, dtype: DataType) -> Self {
        Self {
            dtype,
            ..self.clone()
        }
    }

    /// Contiguous descriptor with the same extents and type.
    pub fn contiguous(&self, order: Order) -> Self {
        if self.is_empty() && self.extents.is_empty() {
            return Self::empty(self.dtype);
        }
        let strides = contiguous_strides(&self.extents, order);
        Self::from_parts(self.dtype, order, self.extents.clone(), strides)
    }

    /// Number of elements the layout addresses: largest offset plus one.
    pub fn span(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        1 + self
            .extents
            .iter()
            .zip(self.strides.iter())
            .map(|(e, s)| (e - 1) * s)
            .sum::<usize>()
    }

    /// Bounds and rank check for a multi-index.
    pub fn check_coords(&self, coords: &[usize]) -> NdResult<()> {
        if coords.len() != self.rank() {
            return Err(NdError::rank_mismatch(
                "index",
                self.rank(),
                coords.len(),
            ));
        }
        if coords.iter().zip(self.extents.iter()).any(|(c, e)| c >= e) {
            return Err(NdError::out_of_bounds(coords, &self.extents));
        }
        Ok(())
    }

    /// Element offset of a multi-index, without bounds checks.
    pub fn offset_of_coords(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.rank());
        coords
            .iter()
            .zip(self.strides.iter())
            .map(|(c, s)| c * s)
            .sum()
    }

    /// Element offset of the `index`-th element in row-major logical order.
    pub fn offset_of_index(&self, index: usize) -> usize {
        let mut rem = index;
        let mut offset = 0;
        for d in (0..self.rank()).rev() {
            let extent = self.extents[d];
            offset += (rem % extent) * self.strides[d];
            rem /= extent;
        }
        offset
    }

    /// Row-major multi-index of the `index`-th element.
    pub fn index_to_coords(&self, index: usize) -> Shape {
        let mut coords: Shape = smallvec![0; self.rank()];
        let mut rem = index;
        for d in (0..self.rank()).rev() {
            coords[d] = rem % self.extents[d];
            rem /= self.extents[d];
        }
        coords
    }

    /// Reorder axes; `dims` must be a permutation of `0..rank`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidDimensions`] when `dims` is not a permutation.
    pub fn permute(&self, dims: &[usize]) -> NdResult<Self> {
        let rank = self.rank();
        if dims.len() != rank {
            return Err(NdError::invalid_dimensions(
                dims,
                rank,
                "permutation length must equal rank",
            ));
        }
        let mut seen = [false; MAX_RANK];
        for &d in dims {
            if d >= rank || seen[d] {
                return Err(NdError::invalid_dimensions(
                    dims,
                    rank,
                    "not a permutation",
                ));
            }
            seen[d] = true;
        }
        if self.is_empty() && self.extents.is_empty() {
            return Ok(self.clone());
        }
        let extents: Shape = dims.iter().map(|&d| self.extents[d]).collect();
        let strides: Shape = dims.iter().map(|&d| self.strides[d]).collect();
        Ok(Self::from_parts(self.dtype, self.order, extents, strides))
    }

    /// Reverse the axes.
    pub fn transpose(&self) -> Self {
        let extents: Shape = self.extents.iter().rev().copied().collect();
        let strides: Shape = self.strides.iter().rev().copied().collect();
        if self.is_empty() && self.extents.is_empty() {
            return self.clone();
        }
        Self::from_parts(self.dtype, self.order, extents, strides)
    }

    /// Reinterpret the same elements under new extents without copying.
    ///
    /// Elements are traversed in `order`. Returns `None` when the current
    /// strides cannot express the new shape; the caller then has to copy.
    /// The caller guarantees both shapes have the same length.
    pub fn reshape_view(&self, order: Order, new_extents: &[usize]) -> Option<Self> {
        if new_extents.len() > MAX_RANK {
            return None;
        }
        if self.length() == 0 || new_extents.contains(&0) {
            return Some(Self::from_parts(
                self.dtype,
                order,
                Shape::from_slice(new_extents),
                contiguous_strides(new_extents, order),
            ));
        }

        let (old_dims, old_strides): (Shape, Shape) = self
            .extents
            .iter()
            .zip(self.strides.iter())
            .filter(|(e, _)| **e != 1)
            .map(|(e, s)| (*e, *s))
            .unzip();
        let old_nd = old_dims.len();
        let new_nd = new_extents.len();
        let is_f = order == Order::F;
        let mut new_strides: Shape = smallvec![0; new_nd];

        let (mut oi, mut oj, mut ni, mut nj) = (0usize, 1usize, 0usize, 1usize);
        while ni < new_nd && oi < old_nd {
            let mut np = new_extents[ni];
            let mut op = old_dims[oi];
            while np != op {
                if np < op {
                    if nj >= new_nd {
                        return None;
                    }
                    np *= new_extents[nj];
                    nj += 1;
                } else {
                    if oj >= old_nd {
                        return None;
                    }
                    op *= old_dims[oj];
                    oj += 1;
                }
            }

            for ok in oi..oj - 1 {
                let mergeable = if is_f {
                    old_strides[ok + 1] == old_dims[ok] * old_strides[ok]
                } else {
                    old_strides[ok] == old_dims[ok + 1] * old_strides[ok + 1]
                };
                if !mergeable {
                    return None;
                }
            }

            if is_f {
                new_strides[ni] = old_strides[oi];
                for nk in ni + 1..nj {
                    new_strides[nk] = new_strides[nk - 1] * new_extents[nk - 1];
                }
            } else {
                new_strides[nj - 1] = old_strides[oj - 1];
                for nk in (ni + 1..nj).rev() {
                    new_strides[nk - 1] = new_strides[nk] * new_extents[nk];
                }
            }
            ni = nj;
            nj += 1;
            oi = oj;
            oj += 1;
        }

        // trailing unit axes
        let mut last_stride = if ni >= 1 { new_strides[ni - 1] } else { 1 };
        if is_f && ni >= 1 {
            last_stride *= new_extents[ni - 1];
        }
        for stride in new_strides.iter_mut().skip(ni) {
            *stride = last_stride;
        }

        Some(Self::from_parts(
            self.dtype,
            order,
            Shape::from_slice(new_extents),
            new_strides,
        ))
    }

    /// Descriptor of the result of reducing over `dims`.
    ///
    /// An empty `dims` reduces over every axis. With `keep_dims` the reduced
    /// axes stay as unit axes, otherwise they are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::InvalidDimensions`] for an axis outside `0..rank`.
    pub fn reduced(&self, dims: &[usize], keep_dims: bool) -> NdResult<Self> {
        let rank = self.rank();
        if let Some(&bad) = dims.iter().find(|&&d| d >= rank) {
            return Err(NdError::invalid_dimensions(
                dims,
                rank,
                format!("axis {bad} is out of range"),
            ));
        }
        let reduce_all = dims.is_empty();
        let mut extents = Shape::new();
        for (axis, &extent) in self.extents.iter().enumerate() {
            if reduce_all || dims.contains(&axis) {
                if keep_dims {
                    extents.push(1);
                }
            } else {
                extents.push(extent);
            }
        }
        let strides = contiguous_strides(&extents, self.order);
        Ok(Self::from_parts(self.dtype, self.order, extents, strides))
    }

    /// Extents of the broadcast of `self` with `other`.
    pub fn broadcast_extents(&self, other: &ShapeDescriptor) -> Option<Shape> {
        broadcast_shapes(&self.extents, &other.extents)
    }
}
