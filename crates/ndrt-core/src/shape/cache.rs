//! Process-wide interning of shape descriptors.
//!
//! Every distinct [`ShapeDescriptor`] maps to exactly one
//! [`ConstantShapeBuffer`] per device. Arrays hold the interned buffer, so
//! comparing two arrays' shape buffers by pointer is a valid identity test.

use crate::shape::{encode_shape_info, ShapeDescriptor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct ShapeBufferInner {
    descriptor: ShapeDescriptor,
    primary: Box<[i64]>,
    special: Option<Box<[i64]>>,
}

/// Immutable, shared encoded shape
///
/// Holds the encoding in host memory and, when the owning cache replicates
/// to devices, a second copy standing in for the device-side encoding.
#[derive(Clone)]
pub struct ConstantShapeBuffer(Arc<ShapeBufferInner>);

impl ConstantShapeBuffer {
    fn build(descriptor: &ShapeDescriptor, replicate: bool) -> Self {
        let primary: Box<[i64]> = encode_shape_info(descriptor).into_boxed_slice();
        let special = replicate.then(|| primary.clone());
        Self(Arc::new(ShapeBufferInner {
            descriptor: descriptor.clone(),
            primary,
            special,
        }))
    }

    pub fn descriptor(&self) -> &ShapeDescriptor {
        &self.0.descriptor
    }

    /// Host-side encoding.
    pub fn primary(&self) -> &[i64] {
        &self.0.primary
    }

    /// Device-side encoding, if replicated.
    pub fn special(&self) -> Option<&[i64]> {
        self.0.special.as_deref()
    }

    /// Identity comparison: both handles refer to the same cache entry.
    pub fn ptr_eq(&self, other: &ConstantShapeBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ConstantShapeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantShapeBuffer")
            .field("descriptor", &self.0.descriptor)
            .field("replicated", &self.0.special.is_some())
            .finish()
    }
}

/// Thread-safe descriptor cache with one slot per device.
///
/// # Examples
///
/// ```
/// use ndrt_core::{DataType, Order, ShapeCache, ShapeDescriptor};
///
/// let cache = ShapeCache::new(1, false);
/// let desc = ShapeDescriptor::new(DataType::Float32, Order::C, &[2, 3]).unwrap();
///
/// let a = cache.intern(&desc);
/// let b = cache.intern(&desc.clone());
/// assert!(a.ptr_eq(&b));
/// assert_eq!(cache.len(), 1);
/// ```
pub struct ShapeCache {
    devices: Vec<Mutex<HashMap<ShapeDescriptor, ConstantShapeBuffer>>>,
    replicate: bool,
}

impl ShapeCache {
    /// Cache for `num_devices` devices (at least one slot is always created).
    ///
    /// With `replicate_to_device` every entry also carries a device-side encoding.
    pub fn new(num_devices: usize, replicate_to_device: bool) -> Self {
        let devices = (0..num_devices.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            devices,
            replicate: replicate_to_device,
        }
    }

    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    /// Intern on device 0.
    pub fn intern(&self, descriptor: &ShapeDescriptor) -> ConstantShapeBuffer {
        self.intern_on(descriptor, 0)
    }

    /// Return the cached buffer for `descriptor` on `device`, creating it on first use.
    ///
    /// Device ids wrap around the number of configured devices.
    pub fn intern_on(&self, descriptor: &ShapeDescriptor, device: usize) -> ConstantShapeBuffer {
        let slot = &self.devices[device % self.devices.len()];
        let mut map = slot.lock();
        if let Some(buffer) = map.get(descriptor) {
            return buffer.clone();
        }
        tracing::debug!(
            device,
            rank = descriptor.rank(),
            dtype = %descriptor.data_type(),
            "interning new shape descriptor"
        );
        let buffer = ConstantShapeBuffer::build(descriptor, self.replicate);
        map.insert(descriptor.clone(), buffer.clone());
        buffer
    }

    pub fn contains(&self, descriptor: &ShapeDescriptor, device: usize) -> bool {
        self.devices[device % self.devices.len()]
            .lock()
            .contains_key(descriptor)
    }

    /// Total number of entries across devices.
    pub fn len(&self) -> usize {
        self.devices.iter().map(|slot| slot.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    ///
    /// Buffers already handed out stay valid; arrays created afterwards get
    /// fresh entries, so pointer identity only holds within one generation.
    pub fn reset(&self) {
        for slot in &self.devices {
            slot.lock().clear();
        }
        tracing::debug!("shape cache reset");
    }
}

impl fmt::Debug for ShapeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeCache")
            .field("devices", &self.devices.len())
            .field("entries", &self.len())
            .field("replicate", &self.replicate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Order};
    use std::thread;

    fn desc(extents: &[usize]) -> ShapeDescriptor {
        ShapeDescriptor::new(DataType::Double, Order::C, extents).unwrap()
    }

    #[test]
    fn test_distinct_descriptors_get_distinct_buffers() {
        let cache = ShapeCache::new(1, false);
        let a = cache.intern(&desc(&[2, 3]));
        let b = cache.intern(&desc(&[3, 2]));
        assert!(!a.ptr_eq(&b));
        assert_eq!(cache.len(), 2);
        assert!(a.special().is_none());
    }

    #[test]
    fn test_devices_are_independent() {
        let cache = ShapeCache::new(2, true);
        let d = desc(&[4]);
        let on0 = cache.intern_on(&d, 0);
        let on1 = cache.intern_on(&d, 1);
        assert!(!on0.ptr_eq(&on1));
        assert_eq!(on0.primary(), on1.primary());
        assert_eq!(on0.special(), Some(on0.primary()));
        assert!(cache.contains(&d, 1));
    }

    #[test]
    fn test_reset_clears_entries() {
        let cache = ShapeCache::new(1, false);
        let before = cache.intern(&desc(&[5]));
        cache.reset();
        assert!(cache.is_empty());
        let after = cache.intern(&desc(&[5]));
        assert!(!before.ptr_eq(&after));
        assert_eq!(before.descriptor(), after.descriptor());
    }

    #[test]
    fn test_concurrent_intern_yields_one_entry() {
        let cache = Arc::new(ShapeCache::new(1, false));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.intern(&desc(&[7, 7])))
            })
            .collect();
        let buffers: Vec<ConstantShapeBuffer> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(buffers.windows(2).all(|w| w[0].ptr_eq(&w[1])));
        assert_eq!(cache.len(), 1);
    }
}
