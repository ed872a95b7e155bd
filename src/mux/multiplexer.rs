/*!
 * Reply Multiplexer
 *
 * Registry from correlation identifier to the reply slot of a live
 * transaction. Inbound replies enter through `fulfill` only.
 */

use super::transaction::Transaction;
use crate::core::errors::{OpError, OpResult};
use crate::core::id::{CorrelationId, WrappingGenerator};
use crate::core::limits::DEFAULT_MAX_PENDING;
use crate::executor::Executor;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace};

pub(super) struct MuxInner<R> {
    // Entry lives as long as its transaction holds the id; the sender is
    // taken by the first reply.
    pending: Mutex<AHashMap<u32, Option<oneshot::Sender<R>>>>,
    ids: WrappingGenerator,
    max_pending: usize,
    pub(super) executor: Option<Executor>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Correlates asynchronous replies with pending transactions
///
/// Cheap to clone; clones share one registry. The multiplexer never owns a
/// transaction: it holds the sending half of each live transaction's reply
/// slot. The identifier stays reserved until the transaction resets or
/// drops, even after its reply arrived.
pub struct Multiplexer<R> {
    pub(super) inner: Arc<MuxInner<R>>,
}

impl<R> Clone for Multiplexer<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for [`Multiplexer`]
pub struct MultiplexerBuilder<R> {
    max_pending: usize,
    first_id: u32,
    executor: Option<Executor>,
    _reply: PhantomData<fn() -> R>,
}

impl<R> MultiplexerBuilder<R> {
    /// Limit on simultaneously live transactions
    pub fn max_pending(mut self, limit: usize) -> Self {
        self.max_pending = limit;
        self
    }

    /// First identifier handed out (0 by default)
    pub fn first_id(mut self, id: u32) -> Self {
        self.first_id = id;
        self
    }

    /// Keep `executor` busy while any transaction is open
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Multiplexer<R> {
        Multiplexer {
            inner: Arc::new(MuxInner {
                pending: Mutex::new(AHashMap::new()),
                ids: WrappingGenerator::new(self.first_id),
                max_pending: self.max_pending,
                executor: self.executor,
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }
}

impl<R: Send + 'static> Multiplexer<R> {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MultiplexerBuilder<R> {
        MultiplexerBuilder {
            max_pending: DEFAULT_MAX_PENDING,
            first_id: 0,
            executor: None,
            _reply: PhantomData,
        }
    }

    /// Open a transaction registered with this multiplexer
    pub fn transaction(&self) -> OpResult<Transaction<R>> {
        Transaction::open(self)
    }

    /// Deliver `reply` to the transaction registered under `id`
    ///
    /// Unknown identifiers are dropped silently: late replies after a reset
    /// and duplicate replies under retries are expected. Returns whether a
    /// transaction received the reply.
    pub fn fulfill(&self, id: CorrelationId, reply: R) -> bool {
        let sender = self
            .inner
            .pending
            .lock()
            .get_mut(&id.get())
            .and_then(Option::take);

        match sender.map(|sender| sender.send(reply)) {
            Some(Ok(())) => {
                self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                trace!(%id, "reply delivered");
                true
            }
            _ => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(%id, "reply for unknown transaction dropped");
                false
            }
        }
    }

    /// Number of transactions still waiting for a reply
    pub fn pending(&self) -> usize {
        self.inner
            .pending
            .lock()
            .values()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Number of live transactions, fulfilled or not
    pub fn live_transactions(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Check if `id` belongs to a transaction that can still be fulfilled
    pub fn is_registered(&self, id: CorrelationId) -> bool {
        matches!(self.inner.pending.lock().get(&id.get()), Some(Some(_)))
    }

    #[inline]
    pub fn max_pending(&self) -> usize {
        self.inner.max_pending
    }

    /// Replies handed to a waiting transaction so far
    #[inline]
    pub fn delivered_replies(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    /// Replies dropped for unknown identifiers so far
    #[inline]
    pub fn dropped_replies(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Allocate an identifier and its reply slot
    pub(super) fn register(&self) -> OpResult<(CorrelationId, oneshot::Receiver<R>)> {
        let mut pending = self.inner.pending.lock();
        let id = self
            .inner
            .ids
            .next_free(pending.len(), self.inner.max_pending, |raw| {
                pending.contains_key(&raw)
            })
            .ok_or(OpError::TooManyPending {
                limit: self.inner.max_pending,
            })?;

        let (tx, rx) = oneshot::channel();
        pending.insert(id.get(), Some(tx));
        trace!(%id, pending = pending.len(), "transaction registered");
        Ok((id, rx))
    }

    /// Release `id`; a reply arriving for it afterwards is dropped
    pub(super) fn deregister(&self, id: CorrelationId) {
        if self.inner.pending.lock().remove(&id.get()).is_some() {
            trace!(%id, "transaction deregistered");
        }
    }
}

impl<R: Send + 'static> Default for Multiplexer<R> {
    fn default() -> Self {
        Self::new()
    }
}
