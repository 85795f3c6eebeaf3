//! Strided offset iteration in row-major logical order.

use crate::shape::ShapeDescriptor;
use crate::types::Shape;
use smallvec::smallvec;

/// Iterator over element offsets of a strided layout.
///
/// Yields one offset per logical element, last axis fastest, relative to
/// the first element of the layout.
///
/// # Examples
///
/// ```
/// use ndrt_core::shape::OffsetIter;
///
/// // a 2x2 window with row stride 4
/// let offsets: Vec<usize> = OffsetIter::new(&[2, 2], &[4, 1]).collect();
/// assert_eq!(offsets, vec![0, 1, 4, 5]);
/// ```
#[derive(Debug, Clone)]
pub struct OffsetIter {
    extents: Shape,
    strides: Shape,
    coords: Shape,
    next: usize,
    remaining: usize,
}

impl OffsetIter {
    pub fn new(extents: &[usize], strides: &[usize]) -> Self {
        debug_assert_eq!(extents.len(), strides.len());
        Self {
            extents: Shape::from_slice(extents),
            strides: Shape::from_slice(strides),
            coords: smallvec![0; extents.len()],
            next: 0,
            remaining: extents.iter().product(),
        }
    }

    pub fn from_descriptor(desc: &ShapeDescriptor) -> Self {
        let mut iter = Self::new(desc.extents(), desc.strides());
        if desc.is_empty() {
            iter.remaining = 0;
        }
        iter
    }
}

impl Iterator for OffsetIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.remaining -= 1;
        if self.remaining > 0 {
            for d in (0..self.extents.len()).rev() {
                self.coords[d] += 1;
                self.next += self.strides[d];
                if self.coords[d] < self.extents[d] {
                    break;
                }
                self.next -= self.strides[d] * self.extents[d];
                self.coords[d] = 0;
            }
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for OffsetIter {}
