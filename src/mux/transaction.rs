/*!
 * Transactions
 *
 * One pending request/reply exchange: a correlation identifier, the single
 * reply slot registered under it, and the back-reference used to release
 * the identifier again.
 */

use super::multiplexer::Multiplexer;
use super::Tagged;
use crate::core::errors::{OpError, OpResult};
use crate::core::guard::WorkGuard;
use crate::core::id::CorrelationId;
use crate::executor::Executor;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One request/reply exchange
///
/// The identifier is registered for the lifetime of the transaction and
/// released on drop or [`reset`](Self::reset).
pub struct Transaction<R: Send + 'static> {
    mux: Multiplexer<R>,
    id: CorrelationId,
    slot: Option<oneshot::Receiver<R>>,
    registered: bool,
    _work: Option<WorkGuard<Executor>>,
}

impl<R: Send + 'static> Transaction<R> {
    /// Allocate an identifier on `mux` and register the reply slot
    pub fn open(mux: &Multiplexer<R>) -> OpResult<Self> {
        let (id, slot) = mux.register()?;
        Ok(Self {
            mux: mux.clone(),
            id,
            slot: Some(slot),
            registered: true,
            _work: mux.inner.executor.as_ref().map(Executor::work_guard),
        })
    }

    /// Identifier the request must carry
    #[inline]
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Check if a reply can still be waited for without a reset
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    /// Swap the identifier for a fresh one
    ///
    /// Anything already delivered to, or still arriving for, the old
    /// identifier is discarded. If no fresh identifier can be allocated the
    /// transaction is left unregistered and disarmed; a later reset may
    /// still succeed.
    pub fn reset(&mut self) -> OpResult<()> {
        let stale = self.id;
        self.release();

        let (id, slot) = self.mux.register()?;
        self.id = id;
        self.slot = Some(slot);
        self.registered = true;
        debug!(%stale, %id, "transaction reset");
        Ok(())
    }

    /// Give the identifier back to the multiplexer
    ///
    /// Once released, the old identifier may be handed to another
    /// transaction, so it must never be deregistered a second time.
    fn release(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.mux.deregister(self.id);
        }
        self.slot = None;
    }
}

impl<R> Transaction<R>
where
    R: Tagged + Send + 'static,
{
    /// Wait up to `duration` for a reply tagged `tag`
    ///
    /// # Errors
    ///
    /// - `OpError::Timeout` if no reply arrived in time
    /// - `OpError::UnexpectedReply` if the reply carries another tag
    /// - `OpError::SlotConsumed` if a reply was already taken since the last reset
    pub async fn async_wait_for(&mut self, tag: R::Tag, duration: Duration) -> OpResult<R> {
        let start = Instant::now();
        let slot = self.slot.as_mut().ok_or(OpError::SlotConsumed)?;

        let reply = match tokio::time::timeout(duration, slot).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                self.slot = None;
                return Err(OpError::SlotConsumed);
            }
            Err(_) => {
                debug!(id = %self.id, ?tag, "reply wait timed out");
                return Err(OpError::timeout(start.elapsed(), duration));
            }
        };
        self.slot = None;

        let actual = reply.tag();
        if actual != tag {
            warn!(id = %self.id, expected = ?tag, actual = ?actual, "unexpected reply shape");
            return Err(OpError::UnexpectedReply {
                expected: format!("{:?}", tag),
                actual: format!("{:?}", actual),
            });
        }
        Ok(reply)
    }

    /// Send a request and wait for its tagged reply, resending on timeout
    ///
    /// `send` is called with the identifier the request must carry. After a
    /// timeout the transaction is reset, so a late reply to the earlier
    /// attempt is dropped, and the request is sent again, at most `retries`
    /// more times. Reply mismatches and send errors are returned at once.
    pub async fn exchange<S, Fut, E>(
        &mut self,
        tag: R::Tag,
        timeout: Duration,
        retries: u32,
        mut send: S,
    ) -> Result<R, E>
    where
        S: FnMut(CorrelationId) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<OpError>,
    {
        let mut attempt = 0u32;
        loop {
            if !self.is_armed() {
                self.reset()?;
            }
            send(self.id).await?;

            match self.async_wait_for(tag.clone(), timeout).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_timeout() && attempt < retries => {
                    attempt += 1;
                    debug!(id = %self.id, attempt, "no reply, resending");
                    self.reset()?;
                }
                Err(err) => return Err(E::from(err)),
            }
        }
    }
}

impl<R: Send + 'static> Drop for Transaction<R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<R: Send + 'static> std::fmt::Debug for Transaction<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("armed", &self.is_armed())
            .finish()
    }
}
