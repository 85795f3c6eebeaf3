//! Host/device freshness tracking.
//!
//! Each buffer location carries a [`Freshness`] flag. Writing one location
//! makes the other stale; a stale location must be synchronized before it is
//! read. In host-only builds only the primary flag ever changes.

/// Memory location of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Host memory
    Primary,
    /// Device memory
    Special,
}

impl Location {
    pub fn other(self) -> Location {
        match self {
            Location::Primary => Location::Special,
            Location::Special => Location::Primary,
        }
    }
}

/// State of one location relative to the latest write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Holds the latest data, no access recorded since the last sync
    Actual,
    /// Holds the latest data and was read since
    Read,
    /// Received the latest write
    Written,
    /// The other location received a newer write
    Stale,
}

/// Freshness of both locations of one buffer.
///
/// # Examples
///
/// ```
/// use ndrt_core::buffer::{Freshness, Location, SyncState};
///
/// let mut state = SyncState::new();
/// state.tick_write(Location::Special);
/// assert!(!state.is_actual(Location::Primary));
///
/// state.mark_synced();
/// state.tick_read(Location::Primary);
/// assert_eq!(state.get(Location::Primary), Freshness::Read);
/// assert!(state.is_actual(Location::Special));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    primary: Freshness,
    special: Freshness,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            primary: Freshness::Actual,
            special: Freshness::Actual,
        }
    }

    pub fn get(&self, location: Location) -> Freshness {
        match location {
            Location::Primary => self.primary,
            Location::Special => self.special,
        }
    }

    fn set(&mut self, location: Location, freshness: Freshness) {
        match location {
            Location::Primary => self.primary = freshness,
            Location::Special => self.special = freshness,
        }
    }

    pub fn tick_write(&mut self, location: Location) {
        self.set(location, Freshness::Written);
        self.set(location.other(), Freshness::Stale);
    }

    /// Record a read. Reading a stale location does not make it current.
    pub fn tick_read(&mut self, location: Location) {
        if self.get(location) != Freshness::Stale {
            self.set(location, Freshness::Read);
        }
    }

    pub fn is_actual(&self, location: Location) -> bool {
        self.get(location) != Freshness::Stale
    }

    /// Both locations hold the same data.
    pub fn mark_synced(&mut self) {
        self.primary = Freshness::Actual;
        self.special = Freshness::Actual;
    }

    /// Mark `location` stale without recording a write elsewhere.
    pub fn invalidate(&mut self, location: Location) {
        self.set(location, Freshness::Stale);
    }
}
