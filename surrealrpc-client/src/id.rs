//! Call identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Produces call ids for one session.
///
/// Ids are the decimal form of a 64-bit counter starting at [`IdGenerator::BASE`].
/// At a million calls per second the counter would take over half a million
/// years to wrap, so wraparound is not handled.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// First id issued in a session.
    pub const BASE: u64 = 1;

    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(Self::BASE),
        }
    }

    /// Returns the next id. Safe to call from any number of threads.
    pub fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Returns how many ids have been issued.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - Self::BASE
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
