/*!
 * Phaser
 *
 * Async barrier over a count of in-flight branches. `discard()` registers a
 * branch and hands back a token; finishing (or dropping) the token retires
 * it. `async_wait()` resumes once no branch is in flight.
 *
 * ## Example
 *
 * ```ignore
 * let phaser = Phaser::new();
 * for frame in frames {
 *     let branch = phaser.discard();
 *     tokio::spawn(async move {
 *         writer.write_frame(&frame).await;
 *         branch.complete(());
 *     });
 * }
 * phaser.async_wait().await; // every writer finished
 * ```
 */

mod serial;

pub use serial::SerialWriter;

use crate::core::guard::WorkGuard;
use crate::executor::Executor;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

struct PhaserInner {
    in_flight: AtomicUsize,
    idle: Notify,
    executor: Option<Executor>,
}

/// Async barrier counting in-flight branches
///
/// Clones share one counter. Branch tokens keep the counter alive, so the
/// barrier always outlives its outstanding branches.
#[derive(Clone)]
pub struct Phaser {
    inner: Arc<PhaserInner>,
}

impl Phaser {
    /// Create an idle phaser
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a phaser whose branches keep `executor` busy
    pub fn with_executor(executor: Executor) -> Self {
        Self::build(Some(executor))
    }

    fn build(executor: Option<Executor>) -> Self {
        Self {
            inner: Arc::new(PhaserInner {
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                executor,
            }),
        }
    }

    /// Register one in-flight branch
    pub fn discard(&self) -> Branch {
        let n = self.inner.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(in_flight = n, "phaser branch registered");
        Branch {
            phaser: Some(Arc::clone(&self.inner)),
            _work: self.inner.executor.as_ref().map(Executor::work_guard),
        }
    }

    /// Branches currently in flight
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Check if no branch is in flight
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Wait until no branch is in flight
    ///
    /// When the phaser is already idle this still yields to the scheduler
    /// once, so callers never observe an inline resumption.
    pub async fn async_wait(&self) {
        if self.is_idle() {
            tokio::task::yield_now().await;
            return;
        }

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

    /// Run `future` as one branch of this phaser
    pub async fn track<F: Future>(&self, future: F) -> F::Output {
        let branch = self.discard();
        let output = future.await;
        branch.complete(());
        output
    }
}

impl Default for Phaser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Phaser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phaser")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Token for one in-flight branch
///
/// Retired by [`complete`](Self::complete), by the callback from
/// [`into_callback`](Self::into_callback), or by being dropped.
#[must_use = "dropping a branch retires it immediately"]
pub struct Branch {
    phaser: Option<Arc<PhaserInner>>,
    _work: Option<WorkGuard<Executor>>,
}

impl Branch {
    /// Retire the branch; the arguments are discarded
    pub fn complete<A>(mut self, _args: A) {
        self.finish();
    }

    /// Adapt into a completion callback that retires the branch
    pub fn into_callback<A: 'static>(self) -> impl FnOnce(A) + Send + 'static {
        move |args| self.complete(args)
    }

    fn finish(&mut self) {
        let Some(phaser) = self.phaser.take() else {
            return;
        };

        let prev = phaser.in_flight.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "phaser branch count underflow");
        trace!(in_flight = prev - 1, "phaser branch retired");
        if prev == 1 {
            phaser.idle.notify_waiters();
        }
    }
}

impl Drop for Branch {
    fn drop(&mut self) {
        self.finish();
    }
}
