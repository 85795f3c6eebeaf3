//! Host/device synchronization of array buffers.
//!
//! Kernels bracket their launch with a `prepare_*_use` / `register_*_use`
//! pair: preparation brings every input (and optionally every output) up to
//! date on the side the kernel runs on, registration records the reads and
//! writes the kernel performed. Arrays sharing a buffer are handled once,
//! and a buffer that is both read and written is registered as written.

use crate::array::NDArray;
use crate::buffer::{DataBuffer, Location};
use crate::error::NdResult;
use std::sync::Arc;

fn unique_buffers<'a>(arrays: &[&'a NDArray]) -> Vec<&'a Arc<DataBuffer>> {
    let mut seen: Vec<&Arc<DataBuffer>> = Vec::with_capacity(arrays.len());
    for array in arrays {
        if !seen.iter().any(|b| Arc::ptr_eq(b, &array.buffer)) {
            seen.push(&array.buffer);
        }
    }
    seen
}

fn prepare_use(
    location: Location,
    writables: &[&NDArray],
    readables: &[&NDArray],
    synchronize_writables: bool,
) -> NdResult<()> {
    for buffer in unique_buffers(readables) {
        buffer.sync_to(location)?;
    }
    if synchronize_writables {
        for buffer in unique_buffers(writables) {
            buffer.sync_to(location)?;
        }
    } else if location == Location::Special {
        for buffer in unique_buffers(writables) {
            buffer.allocate_special()?;
        }
    }
    Ok(())
}

fn register_use(location: Location, writables: &[&NDArray], readables: &[&NDArray]) {
    let written = unique_buffers(writables);
    for buffer in &written {
        buffer.tick_write(location);
    }
    for buffer in unique_buffers(readables) {
        if !written.iter().any(|w| Arc::ptr_eq(w, buffer)) {
            buffer.tick_read(location);
        }
    }
}

impl NDArray {
    /// Copy newer device data back to the host, if any.
    pub fn sync_to_host(&self) -> NdResult<()> {
        self.buffer.sync_to(Location::Primary)
    }

    /// Copy newer host data to the device, allocating the mirror if needed.
    pub fn sync_to_device(&self) -> NdResult<()> {
        self.buffer.sync_to(Location::Special)
    }

    pub fn tick_write_host(&self) {
        self.buffer.tick_write(Location::Primary);
    }

    pub fn tick_write_device(&self) {
        self.buffer.tick_write(Location::Special);
    }

    pub fn tick_read_host(&self) {
        self.buffer.tick_read(Location::Primary);
    }

    pub fn tick_read_device(&self) {
        self.buffer.tick_read(Location::Special);
    }

    pub fn tick_both_actual(&self) {
        self.buffer.tick_both_actual();
    }

    pub fn is_actual_on_host_side(&self) -> bool {
        self.buffer.is_actual(Location::Primary)
    }

    pub fn is_actual_on_device_side(&self) -> bool {
        self.buffer.is_actual(Location::Special)
    }

    /// Make `readables` (and with `synchronize_writables` also `writables`)
    /// current on the device before a kernel launch.
    ///
    /// Outputs that are not synchronized still get their device mirror
    /// allocated. In host-only contexts this does nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndrt_core::{DataType, LaunchContext, NDArray, RuntimeConfig};
    ///
    /// let ctx = LaunchContext::new(RuntimeConfig::accelerated()).unwrap();
    /// let x = NDArray::zeros(&ctx, &[4], DataType::Float32).unwrap();
    /// let z = NDArray::zeros(&ctx, &[4], DataType::Float32).unwrap();
    ///
    /// NDArray::prepare_special_use(&[&z], &[&x], false).unwrap();
    /// assert!(x.is_actual_on_device_side());
    /// NDArray::register_special_use(&[&z], &[&x]);
    /// assert!(!z.is_actual_on_host_side());
    /// ```
    pub fn prepare_special_use(
        writables: &[&NDArray],
        readables: &[&NDArray],
        synchronize_writables: bool,
    ) -> NdResult<()> {
        prepare_use(Location::Special, writables, readables, synchronize_writables)
    }

    /// Record a device kernel's writes and reads.
    pub fn register_special_use(writables: &[&NDArray], readables: &[&NDArray]) {
        register_use(Location::Special, writables, readables);
    }

    /// Host counterpart of [`NDArray::prepare_special_use`].
    pub fn prepare_primary_use(
        writables: &[&NDArray],
        readables: &[&NDArray],
        synchronize_writables: bool,
    ) -> NdResult<()> {
        prepare_use(Location::Primary, writables, readables, synchronize_writables)
    }

    /// Host counterpart of [`NDArray::register_special_use`].
    pub fn register_primary_use(writables: &[&NDArray], readables: &[&NDArray]) {
        register_use(Location::Primary, writables, readables);
    }
}
