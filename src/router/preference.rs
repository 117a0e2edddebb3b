//! Sticky auto-mode preference
//!
//! Remembers which catalog candidate last answered an auto request so the
//! next auto request tries it first. The slot is a single atomic holding a
//! catalog position: concurrent requests read and overwrite it without any
//! lock, last writer wins. It is an ordering hint and never affects
//! correctness.

use std::sync::atomic::{AtomicUsize, Ordering};

const EMPTY: usize = usize::MAX;

/// Last-successful-candidate slot for auto mode
///
/// Holds a position in the owning router's catalog. Only the router writes
/// it, translating candidate ids through that catalog.
#[derive(Debug)]
pub struct AutoPreference {
    slot: AtomicUsize,
}

impl AutoPreference {
    /// Create an empty preference
    pub fn new() -> Self {
        Self {
            slot: AtomicUsize::new(EMPTY),
        }
    }

    /// Catalog position of the last auto winner, if any
    pub fn get(&self) -> Option<usize> {
        match self.slot.load(Ordering::Relaxed) {
            EMPTY => None,
            position => Some(position),
        }
    }

    /// Overwrite the slot with a new winner
    pub fn record(&self, position: usize) {
        if position != EMPTY {
            self.slot.store(position, Ordering::Relaxed);
        }
    }
}

impl Default for AutoPreference {
    fn default() -> Self {
        Self::new()
    }
}
