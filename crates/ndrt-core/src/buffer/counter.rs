//! Allocation ledger with optional per-device and per-group limits.

use crate::error::{NdError, NdResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// Memory group an allocation is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryGroup {
    Host,
    Device,
}

impl fmt::Display for MemoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryGroup::Host => f.write_str("host"),
            MemoryGroup::Device => f.write_str("device"),
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    device_usage: HashMap<usize, usize>,
    group_usage: HashMap<MemoryGroup, usize>,
    device_limits: HashMap<usize, usize>,
    group_limits: HashMap<MemoryGroup, usize>,
}

/// Tracks bytes allocated per device and per memory group.
///
/// Every allocation is charged to both a device id and a group. An
/// allocation that would push either total past its limit is refused.
///
/// # Examples
///
/// ```
/// use ndrt_core::buffer::{MemoryCounter, MemoryGroup};
///
/// let counter = MemoryCounter::new();
/// counter.set_group_limit(MemoryGroup::Host, 1024);
///
/// counter.count_in(0, MemoryGroup::Host, 1000).unwrap();
/// assert!(counter.count_in(0, MemoryGroup::Host, 100).is_err());
///
/// counter.count_out(0, MemoryGroup::Host, 1000);
/// assert_eq!(counter.allocated_group(MemoryGroup::Host), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCounter {
    ledger: Mutex<Ledger>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_device_limit(&self, device: usize, bytes: usize) {
        self.ledger.lock().device_limits.insert(device, bytes);
    }

    pub fn set_group_limit(&self, group: MemoryGroup, bytes: usize) {
        self.ledger.lock().group_limits.insert(group, bytes);
    }

    pub fn device_limit(&self, device: usize) -> Option<usize> {
        self.ledger.lock().device_limits.get(&device).copied()
    }

    pub fn group_limit(&self, group: MemoryGroup) -> Option<usize> {
        self.ledger.lock().group_limits.get(&group).copied()
    }

    pub fn allocated_device(&self, device: usize) -> usize {
        self.ledger
            .lock()
            .device_usage
            .get(&device)
            .copied()
            .unwrap_or(0)
    }

    pub fn allocated_group(&self, group: MemoryGroup) -> usize {
        self.ledger
            .lock()
            .group_usage
            .get(&group)
            .copied()
            .unwrap_or(0)
    }

    /// Whether `bytes` more would fit under both limits.
    pub fn validate(&self, device: usize, group: MemoryGroup, bytes: usize) -> bool {
        let ledger = self.ledger.lock();
        Self::check(&ledger, device, group, bytes).is_ok()
    }

    fn check(ledger: &Ledger, device: usize, group: MemoryGroup, bytes: usize) -> NdResult<()> {
        let device_used = ledger.device_usage.get(&device).copied().unwrap_or(0);
        if let Some(&limit) = ledger.device_limits.get(&device) {
            if device_used.saturating_add(bytes) > limit {
                return Err(NdError::Allocation {
                    device,
                    group: group.to_string(),
                    requested: bytes,
                    allocated: device_used,
                    limit,
                });
            }
        }
        let group_used = ledger.group_usage.get(&group).copied().unwrap_or(0);
        if let Some(&limit) = ledger.group_limits.get(&group) {
            if group_used.saturating_add(bytes) > limit {
                return Err(NdError::Allocation {
                    device,
                    group: group.to_string(),
                    requested: bytes,
                    allocated: group_used,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Charge an allocation.
    ///
    /// # Errors
    ///
    /// Returns [`NdError::Allocation`] when a device or group limit would be
    /// exceeded; nothing is charged in that case.
    pub fn count_in(&self, device: usize, group: MemoryGroup, bytes: usize) -> NdResult<()> {
        let mut ledger = self.ledger.lock();
        if let Err(err) = Self::check(&ledger, device, group, bytes) {
            tracing::warn!(device, %group, bytes, "allocation refused by memory limit");
            return Err(err);
        }
        *ledger.device_usage.entry(device).or_insert(0) += bytes;
        *ledger.group_usage.entry(group).or_insert(0) += bytes;
        Ok(())
    }

    /// Release a previously charged allocation.
    pub fn count_out(&self, device: usize, group: MemoryGroup, bytes: usize) {
        let mut ledger = self.ledger.lock();
        if let Some(used) = ledger.device_usage.get_mut(&device) {
            *used = used.saturating_sub(bytes);
        }
        if let Some(used) = ledger.group_usage.get_mut(&group) {
            *used = used.saturating_sub(bytes);
        }
    }
}
