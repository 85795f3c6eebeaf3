//! Raw storage: owned or wrapped bytes, host/device freshness and the memory ledger.
//!
//! - [`DataBuffer`]: shared storage with a primary (host) location and an
//!   optional special (device) mirror
//! - [`SyncState`] / [`Freshness`] / [`Location`]: which location holds the latest data
//! - [`MemoryCounter`]: allocation accounting with device and group limits

mod counter;
mod data_buffer;
mod freshness;
mod memory;

pub use counter::{MemoryCounter, MemoryGroup};
pub use data_buffer::DataBuffer;
pub use freshness::{Freshness, Location, SyncState};
