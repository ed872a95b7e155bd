/*!
 * Coarse Cancellation
 *
 * A resource is cancelled as a whole: every operation outstanding on it is
 * asked to stop. `CancelToken` is the reference implementation a transport
 * can embed. Each cancel bumps a generation counter, and an operation only
 * reacts to cancels issued after it started.
 */

use crate::core::errors::OpError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

/// Resources whose outstanding operations can be cancelled together
pub trait Cancel {
    /// Cancel every operation currently outstanding on the resource
    fn cancel(&self);
}

impl<T: Cancel + ?Sized> Cancel for &T {
    fn cancel(&self) {
        (**self).cancel()
    }
}

impl<T: Cancel + ?Sized> Cancel for Arc<T> {
    fn cancel(&self) {
        (**self).cancel()
    }
}

struct TokenInner {
    generation: AtomicU64,
    notify: Notify,
}

/// Shared cancellation signal for one resource
///
/// Clones observe the same cancels.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                generation: AtomicU64::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel everything currently running under this token
    pub fn cancel(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(generation, "cancel issued");
        self.inner.notify.notify_waiters();
    }

    /// Current generation; starts at 0 and grows by one per cancel
    #[inline]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Number of cancels issued so far
    #[inline]
    pub fn cancellations(&self) -> u64 {
        self.generation()
    }

    /// Resolve once a cancel is issued after `generation`
    pub async fn cancelled_since(&self, generation: u64) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.generation() > generation {
                return;
            }
            notified.await;
        }
    }

    /// Run `op` until it finishes or the token is cancelled
    ///
    /// The generation is captured when `run` is called, not when the returned
    /// future is first polled: cancels issued before the call do not affect
    /// it, cancels issued after it do, even if the future has not been polled
    /// yet. A cancel drops `op` and yields `OpError::Aborted`.
    pub fn run<F, U, E>(&self, op: F) -> impl Future<Output = Result<U, E>>
    where
        F: Future<Output = Result<U, E>>,
        E: From<OpError>,
    {
        let generation = self.generation();
        let token = self.clone();
        async move {
            tokio::select! {
                biased;
                _ = token.cancelled_since(generation) => Err(E::from(OpError::Aborted)),
                result = op => result,
            }
        }
    }
}

impl Cancel for CancelToken {
    fn cancel(&self) {
        CancelToken::cancel(self)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("generation", &self.generation())
            .finish()
    }
}
