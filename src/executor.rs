/*!
 * Executor Context
 *
 * Explicit context object threaded through every composed operation:
 * a tokio runtime handle, an outstanding-work counter that work guards
 * feed, and the lifecycle statistics of the operations it drives.
 */

use crate::core::guard::{WorkExecutor, WorkGuard};
use crate::operation::stats::{OperationStats, OperationStatsSnapshot};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

struct ExecutorInner {
    outstanding: AtomicUsize,
    idle: Notify,
    stats: OperationStats,
}

/// Scheduler handle with work tracking
///
/// Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct Executor {
    handle: Handle,
    inner: Arc<ExecutorInner>,
}

impl Executor {
    /// Create executor context around a runtime handle
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            inner: Arc::new(ExecutorInner {
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
                stats: OperationStats::new(),
            }),
        }
    }

    /// Executor context for the runtime this call is made from
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Executor context for the current runtime, if any
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Underlying runtime handle
    #[inline]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn a future onto the runtime
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Acquire a keep-alive token on this executor
    pub fn work_guard(&self) -> WorkGuard<Executor> {
        WorkGuard::new(self.clone())
    }

    /// Units of work currently outstanding
    #[inline]
    pub fn outstanding_work(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Check if no work is outstanding
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.outstanding_work() == 0
    }

    /// Wait until no work is outstanding
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Lifecycle counters of operations started on this executor
    #[inline]
    pub fn stats(&self) -> OperationStatsSnapshot {
        self.inner.stats.snapshot()
    }

    #[inline]
    pub(crate) fn raw_stats(&self) -> &OperationStats {
        &self.inner.stats
    }
}

impl WorkExecutor for Executor {
    #[inline]
    fn on_work_started(&self) {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    fn on_work_finished(&self) {
        let prev = self.inner.outstanding.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "executor work count underflow");
        if prev == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("outstanding_work", &self.outstanding_work())
            .field("stats", &self.stats())
            .finish()
    }
}
