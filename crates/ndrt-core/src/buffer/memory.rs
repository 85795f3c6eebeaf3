//! Raw byte storage behind one buffer location.

use std::ptr::NonNull;

/// Bytes of a single location, either owned or wrapped external memory.
///
/// Owned storage is backed by `u64` words so that every element type up to
/// eight bytes is naturally aligned.
pub(crate) enum Memory {
    Owned {
        words: Vec<u64>,
        len: usize,
    },
    External {
        ptr: NonNull<u8>,
        len: usize,
        owner: bool,
    },
}

// External memory is only reachable through the owning buffer's lock.
unsafe impl Send for Memory {}
unsafe impl Sync for Memory {}

impl Memory {
    pub(crate) fn zeroed(len: usize) -> Self {
        Memory::Owned {
            words: vec![0u64; len.div_ceil(8)],
            len,
        }
    }

    /// Wrap caller memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// this value lives. When `owner` is true the memory must come from a
    /// `Box<[u8]>` of exactly `len` bytes; it is released through that box.
    pub(crate) unsafe fn external(ptr: NonNull<u8>, len: usize, owner: bool) -> Self {
        Memory::External { ptr, len, owner }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Memory::Owned { len, .. } | Memory::External { len, .. } => *len,
        }
    }

    /// Whether dropping this value releases the bytes.
    pub(crate) fn is_owner(&self) -> bool {
        match self {
            Memory::Owned { .. } => true,
            Memory::External { owner, .. } => *owner,
        }
    }

    /// Whether the bytes were allocated by this crate and are on the ledger.
    pub(crate) fn is_counted(&self) -> bool {
        matches!(self, Memory::Owned { .. })
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            Memory::Owned { words, len } => &bytemuck::cast_slice::<u64, u8>(words)[..*len],
            Memory::External { ptr, len, .. } => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Memory::Owned { words, len } => {
                &mut bytemuck::cast_slice_mut::<u64, u8>(words)[..*len]
            }
            Memory::External { ptr, len, .. } => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr(), *len)
            },
        }
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        if let Memory::External {
            ptr,
            len,
            owner: true,
        } = *self
        {
            let slice = std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len);
            drop(unsafe { Box::from_raw(slice) });
        }
    }
}
