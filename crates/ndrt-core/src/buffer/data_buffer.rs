//! Shared raw storage with an optional device mirror.

use crate::buffer::freshness::{Freshness, Location, SyncState};
use crate::buffer::memory::Memory;
use crate::buffer::{MemoryCounter, MemoryGroup};
use crate::context::LaunchContext;
use crate::error::{NdError, NdResult};
use crate::types::DataType;
use parking_lot::{MappedRwLockWriteGuard, Mutex, RwLock, RwLockWriteGuard};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Locations {
    primary: Memory,
    special: Option<Memory>,
    len: usize,
}

impl Locations {
    fn bytes(&self, location: Location) -> &[u8] {
        match location {
            Location::Primary => self.primary.as_bytes(),
            Location::Special => self.special.as_ref().map(Memory::as_bytes).unwrap_or(&[]),
        }
    }

    fn bytes_mut(&mut self, location: Location) -> &mut [u8] {
        match location {
            Location::Primary => self.primary.as_bytes_mut(),
            Location::Special => match self.special.as_mut() {
                Some(memory) => memory.as_bytes_mut(),
                None => &mut [],
            },
        }
    }

    fn copy_between(&mut self, from: Location) {
        let len = self.len;
        if let Some(special) = self.special.as_mut() {
            match from {
                Location::Primary => {
                    special.as_bytes_mut()[..len].copy_from_slice(&self.primary.as_bytes()[..len])
                }
                Location::Special => {
                    self.primary.as_bytes_mut()[..len].copy_from_slice(&special.as_bytes()[..len])
                }
            }
        }
    }
}

fn group_of(location: Location) -> MemoryGroup {
    match location {
        Location::Primary => MemoryGroup::Host,
        Location::Special => MemoryGroup::Device,
    }
}

/// Raw storage shared by every array that views it.
///
/// A buffer owns (or wraps) a primary host allocation and, in accelerated
/// mode, lazily allocates a special device-side mirror. A [`SyncState`]
/// records which location holds the latest data; reads through the
/// `*_with` helpers synchronize first.
///
/// Sharing is expressed with `Arc<DataBuffer>`: the storage is released
/// when the last array referencing it is dropped.
///
/// # Examples
///
/// ```
/// use ndrt_core::{DataType, LaunchContext};
/// use ndrt_core::buffer::{DataBuffer, Location};
///
/// let ctx = LaunchContext::host();
/// let buffer = DataBuffer::new(16, DataType::Float32, &ctx).unwrap();
/// assert_eq!(buffer.len_bytes(), 16);
/// assert_eq!(buffer.length_of(), 4);
///
/// buffer.copy_buffer_from_host(&[1, 2, 3, 4], 1).unwrap();
/// buffer.read_primary_with(|bytes| assert_eq!(&bytes[4..8], &[1, 2, 3, 4]));
/// assert!(buffer.is_actual(Location::Primary));
/// ```
pub struct DataBuffer {
    memory: RwLock<Locations>,
    sync: Mutex<SyncState>,
    dtype: DataType,
    accelerated: bool,
    device_id: AtomicUsize,
    ledger: Arc<MemoryCounter>,
}

impl DataBuffer {
    /// Allocate `len_bytes` zeroed bytes of primary memory.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::Allocation`] when the memory ledger refuses the request.
    pub fn new(len_bytes: usize, dtype: DataType, context: &LaunchContext) -> NdResult<Self> {
        let ledger = Arc::clone(context.memory_counter());
        let device_id = context.device_id();
        if len_bytes > 0 {
            ledger.count_in(device_id, MemoryGroup::Host, len_bytes)?;
        }
        Ok(Self {
            memory: RwLock::new(Locations {
                primary: Memory::zeroed(len_bytes),
                special: None,
                len: len_bytes,
            }),
            sync: Mutex::new(SyncState::new()),
            dtype,
            accelerated: context.is_accelerated(),
            device_id: AtomicUsize::new(device_id),
            ledger,
        })
    }

    /// Zero-length buffer; never touches the ledger.
    pub fn empty(dtype: DataType, context: &LaunchContext) -> Self {
        Self {
            memory: RwLock::new(Locations {
                primary: Memory::zeroed(0),
                special: None,
                len: 0,
            }),
            sync: Mutex::new(SyncState::new()),
            dtype,
            accelerated: context.is_accelerated(),
            device_id: AtomicUsize::new(context.device_id()),
            ledger: Arc::clone(context.memory_counter()),
        }
    }

    /// Allocate and fill from `bytes`.
    pub fn from_bytes(bytes: &[u8], dtype: DataType, context: &LaunchContext) -> NdResult<Self> {
        let buffer = Self::new(bytes.len(), dtype, context)?;
        buffer.memory.write().primary.as_bytes_mut().copy_from_slice(bytes);
        Ok(buffer)
    }

    /// Wrap caller-provided host memory without copying.
    ///
    /// Wrapped memory is not charged to the ledger.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len_bytes` bytes for the
    /// lifetime of the buffer and must not be accessed through other paths
    /// while the buffer is alive. With `owner` set, the memory must have
    /// been produced by `Box::<[u8]>::into_raw` with exactly `len_bytes`
    /// bytes; it is released through that box on drop.
    pub unsafe fn from_external(
        ptr: NonNull<u8>,
        len_bytes: usize,
        dtype: DataType,
        owner: bool,
        context: &LaunchContext,
    ) -> Self {
        Self {
            memory: RwLock::new(Locations {
                primary: Memory::external(ptr, len_bytes, owner),
                special: None,
                len: len_bytes,
            }),
            sync: Mutex::new(SyncState::new()),
            dtype,
            accelerated: context.is_accelerated(),
            device_id: AtomicUsize::new(context.device_id()),
            ledger: Arc::clone(context.memory_counter()),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.memory.read().len
    }

    /// Capacity in elements of the buffer's data type.
    pub fn length_of(&self) -> usize {
        self.len_bytes() / self.dtype.size_of_element()
    }

    pub fn data_type(&self) -> DataType {
        self.dtype
    }

    pub fn device_id(&self) -> usize {
        self.device_id.load(Ordering::Acquire)
    }

    pub fn is_accelerated(&self) -> bool {
        self.accelerated
    }

    /// Whether the primary memory is released together with this buffer.
    pub fn is_owner(&self) -> bool {
        self.memory.read().primary.is_owner()
    }

    pub fn is_allocated(&self, location: Location) -> bool {
        match location {
            Location::Primary => true,
            Location::Special => self.memory.read().special.is_some(),
        }
    }

    pub fn primary_ptr(&self) -> *const u8 {
        self.memory.read().primary.as_bytes().as_ptr()
    }

    /// Pointer to the device-side mirror, if one is allocated.
    pub fn special_ptr(&self) -> Option<*const u8> {
        self.memory
            .read()
            .special
            .as_ref()
            .map(|m| m.as_bytes().as_ptr())
    }

    fn charge(&self, location: Location, bytes: usize) -> NdResult<()> {
        if bytes == 0 {
            return Ok(());
        }
        self.ledger
            .count_in(self.device_id(), group_of(location), bytes)
    }

    fn release(&self, location: Location, memory: &Memory) {
        if memory.is_counted() && memory.len() > 0 {
            self.ledger
                .count_out(self.device_id(), group_of(location), memory.len());
        }
    }

    fn recharge(&self, location: Location, memory: &Memory) {
        if memory.is_counted() && memory.len() > 0 {
            if let Err(err) = self
                .ledger
                .count_in(self.device_id(), group_of(location), memory.len())
            {
                tracing::warn!(%err, ?location, "could not restore buffer accounting");
            }
        }
    }

    /// Allocate the special mirror. No-op in host-only mode or when already allocated.
    pub fn allocate_special(&self) -> NdResult<()> {
        if !self.accelerated {
            return Ok(());
        }
        let mut sync = self.sync.lock();
        let mut memory = self.memory.write();
        if memory.special.is_some() {
            return Ok(());
        }
        self.charge(Location::Special, memory.len)?;
        memory.special = Some(Memory::zeroed(memory.len));
        sync.invalidate(Location::Special);
        tracing::trace!(bytes = memory.len, device = self.device_id(), "allocated special buffer");
        Ok(())
    }

    /// Allocate primary memory and, with `alloc_both`, the special mirror as well.
    pub fn allocate_buffers(&self, alloc_both: bool) -> NdResult<()> {
        if alloc_both {
            self.allocate_special()?;
        }
        Ok(())
    }

    /// Release the special mirror after copying any newer data back to primary.
    pub fn delete_special(&self) -> NdResult<()> {
        self.sync_to(Location::Primary)?;
        let mut sync = self.sync.lock();
        let mut memory = self.memory.write();
        if let Some(special) = memory.special.take() {
            self.release(Location::Special, &special);
        }
        sync.mark_synced();
        Ok(())
    }

    pub fn freshness(&self, location: Location) -> Freshness {
        self.sync.lock().get(location)
    }

    /// Whether `location` holds the latest data.
    ///
    /// In host-only mode the primary location is always actual and the
    /// special location never is.
    pub fn is_actual(&self, location: Location) -> bool {
        if !self.accelerated {
            return location == Location::Primary;
        }
        if location == Location::Special && !self.is_allocated(Location::Special) {
            return false;
        }
        self.sync.lock().is_actual(location)
    }

    pub fn tick_write(&self, location: Location) {
        if !self.accelerated && location == Location::Special {
            return;
        }
        self.sync.lock().tick_write(location);
    }

    pub fn tick_read(&self, location: Location) {
        if !self.accelerated && location == Location::Special {
            return;
        }
        self.sync.lock().tick_read(location);
    }

    /// Mark both locations as holding the same data.
    pub fn tick_both_actual(&self) {
        self.sync.lock().mark_synced();
    }

    pub fn set_counters_to_zero(&self) {
        *self.sync.lock() = SyncState::new();
    }

    pub fn copy_counters(&self, other: &DataBuffer) {
        if std::ptr::eq(self, other) {
            return;
        }
        let state = *other.sync.lock();
        *self.sync.lock() = state;
    }

    /// Bring `location` up to date, allocating the special mirror if needed.
    ///
    /// No-op in host-only mode.
    pub fn sync_to(&self, location: Location) -> NdResult<()> {
        if !self.accelerated {
            return Ok(());
        }
        if location == Location::Special {
            self.allocate_special()?;
        }
        let mut sync = self.sync.lock();
        if sync.is_actual(location) {
            return Ok(());
        }
        let mut memory = self.memory.write();
        memory.copy_between(location.other());
        sync.mark_synced();
        tracing::trace!(?location, bytes = memory.len, "synchronized buffer");
        Ok(())
    }

    /// Run `f` over up-to-date primary bytes, recording a host read.
    pub fn read_primary_with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        if self.sync_to(Location::Primary).is_err() {
            tracing::warn!("primary synchronization failed, reading current host bytes");
        }
        self.tick_read(Location::Primary);
        let memory = self.memory.read();
        f(memory.bytes(Location::Primary))
    }

    /// Run `f` over up-to-date primary bytes, recording a host write.
    pub fn write_primary_with<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        if self.sync_to(Location::Primary).is_err() {
            tracing::warn!("primary synchronization failed, writing over current host bytes");
        }
        self.tick_write(Location::Primary);
        let mut memory = self.memory.write();
        f(memory.bytes_mut(Location::Primary))
    }

    /// Raw access to one location, without synchronization or bookkeeping.
    pub fn with_bytes<R>(&self, location: Location, f: impl FnOnce(&[u8]) -> R) -> R {
        let memory = self.memory.read();
        f(memory.bytes(location))
    }

    /// Mutable raw access to one location, without synchronization or bookkeeping.
    pub fn with_bytes_mut<R>(&self, location: Location, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut memory = self.memory.write();
        f(memory.bytes_mut(location))
    }

    /// Write-locked primary bytes, synchronized and marked as written.
    pub(crate) fn primary_guard_mut(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        if self.sync_to(Location::Primary).is_err() {
            tracing::warn!("primary synchronization failed, mapping current host bytes");
        }
        self.tick_write(Location::Primary);
        RwLockWriteGuard::map(self.memory.write(), |m| m.bytes_mut(Location::Primary))
    }

    /// Grow to `new_len` bytes, keeping existing contents. Never shrinks.
    ///
    /// After growing the buffer owns its memory, even if it wrapped external memory before.
    pub fn expand(&self, new_len: usize) -> NdResult<()> {
        let mut memory = self.memory.write();
        if new_len <= memory.len {
            return Ok(());
        }
        let old_len = memory.len;
        let has_special = memory.special.is_some();

        // The old allocations are replaced, so only the new sizes count against the limit
        self.release(Location::Primary, &memory.primary);
        if let Some(special) = memory.special.as_ref() {
            self.release(Location::Special, special);
        }
        let charged = self.charge(Location::Primary, new_len).and_then(|()| {
            if !has_special {
                return Ok(());
            }
            self.charge(Location::Special, new_len).map_err(|err| {
                self.ledger
                    .count_out(self.device_id(), MemoryGroup::Host, new_len);
                err
            })
        });
        if let Err(err) = charged {
            self.recharge(Location::Primary, &memory.primary);
            if let Some(special) = memory.special.as_ref() {
                self.recharge(Location::Special, special);
            }
            return Err(err);
        }

        let mut primary = Memory::zeroed(new_len);
        primary.as_bytes_mut()[..old_len].copy_from_slice(&memory.primary.as_bytes()[..old_len]);
        memory.primary = primary;

        if let Some(old_special) = memory.special.take() {
            let mut special = Memory::zeroed(new_len);
            special.as_bytes_mut()[..old_len].copy_from_slice(&old_special.as_bytes()[..old_len]);
            memory.special = Some(special);
        }
        memory.len = new_len;
        tracing::debug!(old_len, new_len, "expanded data buffer");
        Ok(())
    }

    /// Copy `n_bytes` from `other` into this buffer.
    ///
    /// Offsets are in elements of the respective buffer's data type. A byte
    /// count of zero copies nothing.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::SizeMismatch`] when either range falls outside its buffer.
    pub fn copy_buffer_from(
        &self,
        other: &DataBuffer,
        n_bytes: usize,
        offset_this: usize,
        offset_other: usize,
    ) -> NdResult<()> {
        if n_bytes == 0 {
            return Ok(());
        }
        let dst = offset_this * self.dtype.size_of_element();
        let src = offset_other * other.dtype.size_of_element();

        if std::ptr::eq(self, other) {
            return self.write_primary_with(|bytes| {
                let available = bytes.len();
                if dst + n_bytes > available || src + n_bytes > available {
                    return Err(NdError::size_mismatch(
                        "copy_buffer_from",
                        dst.max(src) + n_bytes,
                        available,
                    ));
                }
                bytes.copy_within(src..src + n_bytes, dst);
                Ok(())
            });
        }

        let staged = other.read_primary_with(|bytes| {
            bytes
                .get(src..src + n_bytes)
                .map(|b| b.to_vec())
                .ok_or_else(|| {
                    NdError::size_mismatch("copy_buffer_from", src + n_bytes, bytes.len())
                })
        })?;
        self.copy_buffer_from_host(&staged, offset_this)
    }

    /// Copy host bytes into this buffer starting at element `offset_this`.
    pub fn copy_buffer_from_host(&self, host: &[u8], offset_this: usize) -> NdResult<()> {
        if host.is_empty() {
            return Ok(());
        }
        let dst = offset_this * self.dtype.size_of_element();
        self.write_primary_with(|bytes| {
            let available = bytes.len();
            let target = bytes.get_mut(dst..dst + host.len()).ok_or_else(|| {
                NdError::size_mismatch("copy_buffer_from_host", dst + host.len(), available)
            })?;
            target.copy_from_slice(host);
            Ok(())
        })
    }

    /// Copy the whole of `src` into the front of `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::SizeMismatch`] when the source is larger than the destination.
    pub fn memcpy(dst: &DataBuffer, src: &DataBuffer) -> NdResult<()> {
        let src_len = src.len_bytes();
        let dst_len = dst.len_bytes();
        if src_len > dst_len {
            return Err(NdError::size_mismatch(
                "DataBuffer::memcpy: source data buffer is larger than destination",
                src_len,
                dst_len,
            ));
        }
        if std::ptr::eq(dst, src) {
            return Ok(());
        }
        let staged = src.read_primary_with(|bytes| bytes.to_vec());
        dst.copy_buffer_from_host(&staged, 0)
    }

    /// Zero the primary memory, and with `both` the special mirror too.
    pub fn set_to_zero(&self, both: bool) {
        let mut sync = self.sync.lock();
        let mut memory = self.memory.write();
        memory.primary.as_bytes_mut().fill(0);
        match memory.special.as_mut() {
            Some(special) if both => {
                special.as_bytes_mut().fill(0);
                sync.mark_synced();
            }
            _ => sync.tick_write(Location::Primary),
        }
    }

    /// Move the buffer's accounting and mirror to another device.
    pub fn migrate(&self, device_id: usize) -> NdResult<()> {
        let current = self.device_id();
        if current == device_id {
            return Ok(());
        }
        let memory = self.memory.read();
        let primary_bytes = if memory.primary.is_counted() { memory.len } else { 0 };
        let special_bytes = memory.special.as_ref().map_or(0, |_| memory.len);

        if primary_bytes > 0 {
            self.ledger
                .count_in(device_id, MemoryGroup::Host, primary_bytes)?;
        }
        if special_bytes > 0 {
            if let Err(err) = self
                .ledger
                .count_in(device_id, MemoryGroup::Device, special_bytes)
            {
                self.ledger
                    .count_out(device_id, MemoryGroup::Host, primary_bytes);
                return Err(err);
            }
        }
        self.ledger
            .count_out(current, MemoryGroup::Host, primary_bytes);
        self.ledger
            .count_out(current, MemoryGroup::Device, special_bytes);
        self.device_id.store(device_id, Ordering::Release);
        tracing::debug!(from = current, to = device_id, "migrated data buffer");
        Ok(())
    }
}

impl Drop for DataBuffer {
    fn drop(&mut self) {
        let memory = self.memory.get_mut();
        let device = self.device_id.load(Ordering::Acquire);
        if memory.primary.is_counted() && memory.len > 0 {
            self.ledger
                .count_out(device, MemoryGroup::Host, memory.len);
        }
        if memory.special.is_some() && memory.len > 0 {
            self.ledger
                .count_out(device, MemoryGroup::Device, memory.len);
        }
    }
}

impl fmt::Debug for DataBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `sync` is always locked before `memory`; snapshot it and release
        let sync = *self.sync.lock();
        let memory = self.memory.read();
        f.debug_struct("DataBuffer")
            .field("dtype", &self.dtype)
            .field("len_bytes", &memory.len)
            .field("owner", &memory.primary.is_owner())
            .field("special", &memory.special.is_some())
            .field("sync", &sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn accelerated() -> Arc<LaunchContext> {
        LaunchContext::new(RuntimeConfig::accelerated()).unwrap()
    }

    #[test]
    fn test_host_only_actuality() {
        let ctx = LaunchContext::host();
        let buffer = DataBuffer::new(8, DataType::Int32, &ctx).unwrap();
        buffer.tick_write(Location::Special);
        assert!(buffer.is_actual(Location::Primary));
        assert!(!buffer.is_actual(Location::Special));
        buffer.allocate_special().unwrap();
        assert!(!buffer.is_allocated(Location::Special));
    }

    #[test]
    fn test_special_write_then_host_read_synchronizes() {
        let ctx = accelerated();
        let buffer = DataBuffer::new(4, DataType::UInt8, &ctx).unwrap();
        buffer.sync_to(Location::Special).unwrap();
        buffer.with_bytes_mut(Location::Special, |b| b.copy_from_slice(&[9, 8, 7, 6]));
        buffer.tick_write(Location::Special);
        assert!(!buffer.is_actual(Location::Primary));

        let seen = buffer.read_primary_with(|b| b.to_vec());
        assert_eq!(seen, vec![9, 8, 7, 6]);
        assert!(buffer.is_actual(Location::Primary));
        assert_eq!(buffer.freshness(Location::Primary), Freshness::Read);
    }

    #[test]
    fn test_host_write_makes_special_stale() {
        let ctx = accelerated();
        let buffer = DataBuffer::new(4, DataType::UInt8, &ctx).unwrap();
        buffer.allocate_special().unwrap();
        buffer.sync_to(Location::Special).unwrap();
        buffer.write_primary_with(|b| b[0] = 1);
        assert!(!buffer.is_actual(Location::Special));
        buffer.sync_to(Location::Special).unwrap();
        buffer.with_bytes(Location::Special, |b| assert_eq!(b[0], 1));
    }

    #[test]
    fn test_expand_preserves_contents_and_never_shrinks() {
        let ctx = LaunchContext::host();
        let buffer = DataBuffer::from_bytes(&[1, 2, 3], DataType::UInt8, &ctx).unwrap();
        buffer.expand(2).unwrap();
        assert_eq!(buffer.len_bytes(), 3);
        buffer.expand(6).unwrap();
        assert_eq!(buffer.len_bytes(), 6);
        buffer.read_primary_with(|b| assert_eq!(b, &[1, 2, 3, 0, 0, 0]));
        assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Host), 6);
    }

    #[test]
    fn test_expand_near_limit_counts_only_new_size() {
        let ctx = LaunchContext::new(RuntimeConfig::default().with_host_memory_limit(16)).unwrap();
        let buffer = DataBuffer::from_bytes(&[7; 10], DataType::UInt8, &ctx).unwrap();
        buffer.expand(16).unwrap();
        assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Host), 16);

        assert!(matches!(buffer.expand(17), Err(NdError::Allocation { .. })));
        assert_eq!(buffer.len_bytes(), 16);
        assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Host), 16);
        buffer.read_primary_with(|b| assert_eq!(&b[..10], &[7; 10]));
    }

    #[test]
    fn test_debug_while_synchronizing_does_not_deadlock() {
        use std::sync::atomic::AtomicBool;
        use std::time::{Duration, Instant};

        let ctx = accelerated();
        let buffer = Arc::new(DataBuffer::new(64, DataType::Float32, &ctx).unwrap());
        buffer.allocate_special().unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(AtomicUsize::new(0));

        let syncer = {
            let (buffer, done, progress) = (buffer.clone(), done.clone(), progress.clone());
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    buffer.tick_write(Location::Special);
                    buffer.sync_to(Location::Primary).unwrap();
                    progress.fetch_add(1, Ordering::AcqRel);
                }
            })
        };
        let formatter = {
            let (buffer, done, progress) = (buffer.clone(), done.clone(), progress.clone());
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    assert!(format!("{buffer:?}").contains("DataBuffer"));
                    progress.fetch_add(1, Ordering::AcqRel);
                }
            })
        };

        let deadline = Instant::now() + Duration::from_secs(10);
        while progress.load(Ordering::Acquire) < 50_000 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        let reached = progress.load(Ordering::Acquire) >= 50_000;
        done.store(true, Ordering::Release);
        assert!(reached, "no progress after {} iterations", progress.load(Ordering::Acquire));
        syncer.join().unwrap();
        formatter.join().unwrap();
    }

    #[test]
    fn test_copy_buffer_from_uses_element_offsets() {
        let ctx = LaunchContext::host();
        let src = DataBuffer::from_bytes(&[1, 0, 2, 0, 3, 0], DataType::Int16, &ctx).unwrap();
        let dst = DataBuffer::new(8, DataType::Int16, &ctx).unwrap();
        dst.copy_buffer_from(&src, 4, 2, 1).unwrap();
        dst.read_primary_with(|b| assert_eq!(b, &[0, 0, 0, 0, 2, 0, 3, 0]));

        assert!(dst.copy_buffer_from(&src, 0, 100, 100).is_ok());
        assert!(matches!(
            dst.copy_buffer_from(&src, 4, 3, 0),
            Err(NdError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_memcpy_rejects_larger_source() {
        let ctx = LaunchContext::host();
        let small = DataBuffer::new(2, DataType::UInt8, &ctx).unwrap();
        let large = DataBuffer::from_bytes(&[4, 5, 6], DataType::UInt8, &ctx).unwrap();
        assert!(DataBuffer::memcpy(&small, &large).is_err());
        DataBuffer::memcpy(&large, &small).unwrap();
        large.read_primary_with(|b| assert_eq!(b, &[0, 0, 6]));
    }

    #[test]
    fn test_ledger_released_on_drop() {
        let ctx = accelerated();
        {
            let buffer = DataBuffer::new(32, DataType::Float32, &ctx).unwrap();
            buffer.allocate_special().unwrap();
            assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Device), 32);
        }
        assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Host), 0);
        assert_eq!(ctx.memory_counter().allocated_group(MemoryGroup::Device), 0);
    }

    #[test]
    fn test_allocation_limit_is_enforced() {
        let ctx = LaunchContext::new(RuntimeConfig::default().with_host_memory_limit(16)).unwrap();
        let _a = DataBuffer::new(16, DataType::UInt8, &ctx).unwrap();
        assert!(matches!(
            DataBuffer::new(1, DataType::UInt8, &ctx),
            Err(NdError::Allocation { .. })
        ));
    }

    #[test]
    fn test_set_to_zero_and_counters() {
        let ctx = accelerated();
        let buffer = DataBuffer::from_bytes(&[1, 2], DataType::UInt8, &ctx).unwrap();
        buffer.allocate_special().unwrap();
        buffer.set_to_zero(true);
        assert!(buffer.is_actual(Location::Special));
        buffer.read_primary_with(|b| assert_eq!(b, &[0, 0]));

        let other = DataBuffer::new(2, DataType::UInt8, &ctx).unwrap();
        other.tick_write(Location::Special);
        buffer.copy_counters(&other);
        assert_eq!(buffer.freshness(Location::Primary), Freshness::Stale);
        buffer.set_counters_to_zero();
        assert_eq!(buffer.freshness(Location::Primary), Freshness::Actual);
    }

    #[test]
    fn test_migrate_moves_accounting() {
        let ctx = LaunchContext::new(RuntimeConfig::accelerated().with_num_devices(2)).unwrap();
        let buffer = DataBuffer::new(8, DataType::UInt8, &ctx).unwrap();
        buffer.migrate(1).unwrap();
        assert_eq!(buffer.device_id(), 1);
        assert_eq!(ctx.memory_counter().allocated_device(0), 0);
        assert_eq!(ctx.memory_counter().allocated_device(1), 8);
    }
}
