/*!
 * ID Generation System
 * Correlation identifiers with wraparound that never collides with a live ID
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Correlation identifier carried by a request and echoed by its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u32);

impl CorrelationId {
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CorrelationId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Monotonic 32-bit generator that wraps around
///
/// The counter alone only guarantees uniqueness until it wraps. Callers pass
/// the set of identifiers still in use, and the generator skips over them, so
/// a long-running registry never hands out an identifier that is still live.
pub struct WrappingGenerator {
    counter: AtomicU32,
}

impl WrappingGenerator {
    /// Create new generator starting at given value
    #[inline]
    pub const fn new(start: u32) -> Self {
        Self {
            counter: AtomicU32::new(start),
        }
    }

    /// Allocate the next identifier for which `is_live` is false
    ///
    /// Returns `None` when `live` identifiers already fill `limit` slots.
    /// `live` must be the number of identifiers for which `is_live` holds,
    /// which bounds the scan to `live + 1` candidates.
    pub fn next_free(
        &self,
        live: usize,
        limit: usize,
        is_live: impl Fn(u32) -> bool,
    ) -> Option<CorrelationId> {
        let capacity = limit.min(u32::MAX as usize + 1);
        if live >= capacity {
            return None;
        }

        loop {
            // fetch_add wraps on overflow
            let candidate = self.counter.fetch_add(1, Ordering::Relaxed);
            if !is_live(candidate) {
                return Some(CorrelationId(candidate));
            }
        }
    }

    /// Get current counter value (for debugging)
    #[inline]
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for WrappingGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}
