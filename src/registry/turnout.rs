//! Last known accessory positions.

use heapless::Vec;
use log::debug;

use crate::commands::TurnoutPosition;
use crate::config::DEFAULT_MAX_TURNOUTS;

/// Position of one accessory address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnoutRecord {
    /// Client accessory address.
    pub address: u16,
    /// Last switched position.
    pub position: TurnoutPosition,
}

/// Bounded turnout position table.
///
/// Keyed by client accessory address. When a new address arrives and the
/// table is full, the whole table is cleared before the new entry is
/// stored.
#[derive(Debug)]
pub struct TurnoutRegistry<const N: usize = DEFAULT_MAX_TURNOUTS> {
    entries: Vec<TurnoutRecord, N>,
}

impl<const N: usize> Default for TurnoutRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TurnoutRegistry<N> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Number of stored positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no position is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of an address, [`TurnoutPosition::Unknown`] if never set.
    pub fn get(&self, address: u16) -> TurnoutPosition {
        self.entries
            .iter()
            .find(|e| e.address == address)
            .map(|e| e.position)
            .unwrap_or_default()
    }

    /// Store the position of an address.
    pub fn set(&mut self, address: u16, position: TurnoutPosition) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.address == address) {
            entry.position = position;
            return;
        }
        if self.entries.is_full() {
            debug!("turnout table full, clearing {} entries", self.entries.len());
            self.entries.clear();
        }
        let _ = self.entries.push(TurnoutRecord { address, position });
    }

    /// Forget every position.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
