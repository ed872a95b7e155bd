/*!
 * Continuations
 *
 * One-shot resumption capabilities for callback-style transports. A task
 * hands a [`Continuation`] to a collaborator that reports completion through
 * a callback, then awaits the paired [`Resumption`].
 */

use crate::core::errors::{OpError, OpResult};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

struct Slot<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

/// Copyable capability that resumes one suspended task
///
/// Clones share one slot: exactly one `resume` across all clones is allowed.
/// A second `resume` is a usage error and panics. Dropping every clone
/// without resuming resolves the task with [`OpError::Abandoned`].
pub struct Continuation<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Continuation<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Send + 'static> Continuation<T> {
    /// Create a continuation and the future it resumes
    pub fn pair() -> (Self, Resumption<T>) {
        let (tx, rx) = oneshot::channel();
        let continuation = Self {
            slot: Arc::new(Slot {
                sender: Mutex::new(Some(tx)),
            }),
        };
        (continuation, Resumption { rx })
    }

    /// Resume the suspended task with `value`
    ///
    /// # Panics
    ///
    /// Panics if this continuation (or a clone of it) was already resumed.
    pub fn resume(&self, value: T) {
        let sender = self.slot.sender.lock().take();
        let Some(sender) = sender else {
            panic!("continuation resumed more than once");
        };
        // The task may have been dropped in the meantime; nothing to resume then
        let _ = sender.send(value);
    }

    /// Check whether a resume already happened
    pub fn is_resumed(&self) -> bool {
        self.slot.sender.lock().is_none()
    }

    /// Adapt into a plain callback for transports that take closures
    pub fn into_callback(self) -> impl FnOnce(T) + Send + 'static {
        move |value| self.resume(value)
    }
}

/// Future side of a [`Continuation`]
#[must_use = "a resumption does nothing unless awaited"]
pub struct Resumption<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Resumption<T> {
    type Output = OpResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| OpError::Abandoned))
    }
}
