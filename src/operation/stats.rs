/*!
 * Lock-Free Operation Statistics
 * Lifecycle counters shared by every operation started on one executor
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic lifecycle counters
///
/// `started` counts task allocations; `completed + abandoned` counts task
/// destructions. The two sides are equal whenever no operation is live.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct OperationStats {
    started: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
    resumptions: AtomicU64,
}

/// Point-in-time copy of [`OperationStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationStatsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub resumptions: u64,
}

impl OperationStatsSnapshot {
    /// Operations allocated but not yet destroyed
    #[inline]
    pub fn live(&self) -> u64 {
        self.started
            .saturating_sub(self.completed)
            .saturating_sub(self.abandoned)
    }
}

impl OperationStats {
    /// Create new atomic stats
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub(crate) fn inc_started(&self) {
        self.started.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn inc_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn inc_resumptions(&self) {
        self.resumptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot for reporting
    ///
    /// Destructions are read before allocations, so a snapshot never shows
    /// more finished operations than started ones.
    pub fn snapshot(&self) -> OperationStatsSnapshot {
        let completed = self.completed.load(Ordering::Acquire);
        let abandoned = self.abandoned.load(Ordering::Acquire);
        let resumptions = self.resumptions.load(Ordering::Relaxed);
        let started = self.started.load(Ordering::Acquire);
        OperationStatsSnapshot {
            started,
            completed,
            abandoned,
            resumptions,
        }
    }
}
