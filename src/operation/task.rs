/*!
 * Composed Operation Tasks
 *
 * A task owns one step future and one completion handler. The scheduler
 * polls it; every `Pending` is a suspension, every later poll a resumption.
 * The first `Ready` is the single completion: the result is moved out of the
 * step future, the future is destroyed, and only then is the handler called.
 * A task dropped before that point still reports exactly once, with
 * [`OpError::Abandoned`].
 */

use super::completion::CompletionHandler;
use super::continuation::{Continuation, Resumption};
use crate::core::errors::OpError;
use crate::core::guard::WorkGuard;
use crate::executor::Executor;
use crate::monitoring::{generate_trace_id, operation_span};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, Span};

/// Lifecycle of a task
///
/// `Created → (Running ⇄ Suspended) → Completed → Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationState {
    Created = 0,
    Running = 1,
    Suspended = 2,
    Completed = 3,
    Destroyed = 4,
}

impl OperationState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Suspended,
            3 => Self::Completed,
            _ => Self::Destroyed,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Destroyed)
    }
}

/// State visible from both the task and its handle
struct TaskShared {
    name: &'static str,
    trace_id: String,
    state: AtomicU8,
    continuation: AtomicBool,
    polls: AtomicU64,
    started_at: Instant,
}

impl TaskShared {
    #[inline]
    fn state(&self) -> OperationState {
        OperationState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn set_state(&self, state: OperationState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Context handed to an operation's step function
///
/// Replaces handler-hook forwarding: everything a nested operation needs from
/// its parent (executor, diagnostic span, continuation hint) is read from here.
#[derive(Clone)]
pub struct OpContext {
    shared: Arc<TaskShared>,
    executor: Executor,
    logger: Span,
}

impl OpContext {
    /// True on every resumption after the first poll
    ///
    /// Nested operations may use this to skip a scheduling round-trip when
    /// they already run as the continuation of in-flight work.
    #[inline]
    pub fn is_continuation(&self) -> bool {
        self.shared.continuation.load(Ordering::Acquire)
    }

    /// Number of times the task was resumed
    #[inline]
    pub fn resumptions(&self) -> u64 {
        self.shared.polls.load(Ordering::Acquire).saturating_sub(1)
    }

    #[inline]
    pub fn state(&self) -> OperationState {
        self.shared.state()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    #[inline]
    pub fn trace_id(&self) -> &str {
        &self.shared.trace_id
    }

    #[inline]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Diagnostic logger of the completion handler (inert when absent)
    #[inline]
    pub fn logger(&self) -> &Span {
        &self.logger
    }

    /// Continuation for a callback-style suspending call
    pub fn continuation<T: Send + 'static>(&self) -> (Continuation<T>, Resumption<T>) {
        Continuation::pair()
    }
}

/// Holds the completion handler until it is consumed exactly once
struct CompletionSlot<C> {
    handler: Option<C>,
    executor: Executor,
}

impl<C> CompletionSlot<C> {
    fn take(&mut self) -> C {
        match self.handler.take() {
            Some(handler) => handler,
            None => panic!("operation completed more than once"),
        }
    }
}

/// Task future driven by the runtime
struct TaskFuture<Fut, C, U, E>
where
    Fut: Future<Output = Result<U, E>>,
    C: CompletionHandler<Result<U, E>>,
    E: From<OpError>,
{
    step: Option<Pin<Box<Fut>>>,
    slot: CompletionSlot<C>,
    shared: Arc<TaskShared>,
    span: Span,
    _work: WorkGuard<Executor>,
    _result: PhantomData<fn() -> Result<U, E>>,
}

// No field is structurally pinned: the step future lives in its own box.
impl<Fut, C, U, E> Unpin for TaskFuture<Fut, C, U, E>
where
    Fut: Future<Output = Result<U, E>>,
    C: CompletionHandler<Result<U, E>>,
    E: From<OpError>,
{
}

impl<Fut, C, U, E> Future for TaskFuture<Fut, C, U, E>
where
    Fut: Future<Output = Result<U, E>>,
    C: CompletionHandler<Result<U, E>>,
    E: From<OpError>,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let _enter = this.span.enter();

        let step = match this.step.as_mut() {
            Some(step) => step,
            None => panic!("operation resumed after completion"),
        };

        if this.shared.polls.fetch_add(1, Ordering::AcqRel) > 0 {
            this.shared.continuation.store(true, Ordering::Release);
            this.slot.executor.raw_stats().inc_resumptions();
            trace!("operation resumed");
        }
        this.shared.set_state(OperationState::Running);

        match step.as_mut().poll(cx) {
            Poll::Pending => {
                this.shared.set_state(OperationState::Suspended);
                Poll::Pending
            }
            Poll::Ready(result) => {
                // The result is already moved out; destroy the step state first
                this.step = None;
                this.shared.set_state(OperationState::Completed);

                let handler = this.slot.take();
                this.slot.executor.raw_stats().inc_completed();
                debug!(
                    ok = result.is_ok(),
                    elapsed_us = this.shared.started_at.elapsed().as_micros() as u64,
                    "operation completed"
                );
                handler.complete(result);

                this.shared.set_state(OperationState::Destroyed);
                Poll::Ready(())
            }
        }
    }
}

impl<Fut, C, U, E> Drop for TaskFuture<Fut, C, U, E>
where
    Fut: Future<Output = Result<U, E>>,
    C: CompletionHandler<Result<U, E>>,
    E: From<OpError>,
{
    fn drop(&mut self) {
        let Some(handler) = self.slot.handler.take() else {
            return;
        };

        let _enter = self.span.enter();
        error!(
            state = ?self.shared.state(),
            "operation dropped before completing; delivering abandonment"
        );
        self.step = None;
        self.slot.executor.raw_stats().inc_abandoned();
        handler.complete(Err(E::from(OpError::Abandoned)));
        self.shared.set_state(OperationState::Destroyed);
    }
}

/// Handle to a started operation
///
/// Dropping the handle detaches it; the operation keeps running and still
/// completes its handler.
pub struct OperationHandle {
    shared: Arc<TaskShared>,
    join: JoinHandle<()>,
}

impl OperationHandle {
    #[inline]
    pub fn state(&self) -> OperationState {
        self.shared.state()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    #[inline]
    pub fn trace_id(&self) -> &str {
        &self.shared.trace_id
    }

    /// Check if the task has been destroyed
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Abort the task
    ///
    /// The completion handler still runs once, with [`OpError::Abandoned`].
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Wait until the task has been destroyed
    pub async fn join(self) {
        // A cancelled join means abort(); the handler already ran from Drop
        let _ = self.join.await;
    }
}

/// Entry points for composed operations
pub struct Operation;

impl Operation {
    /// Start an operation on `executor`
    ///
    /// `step` receives the task's [`OpContext`] and returns the step future.
    /// The task holds a work guard on `executor` until it is destroyed, and
    /// `completion` is invoked exactly once with the step's result.
    ///
    /// # Example
    ///
    /// ```ignore
    /// Operation::start(&executor, "handshake", |ctx| async move {
    ///     port.write(HELLO).await?;
    ///     port.read_reply().await
    /// }, |result| println!("{:?}", result));
    /// ```
    pub fn start<S, Fut, U, E, C>(
        executor: &Executor,
        name: &'static str,
        step: S,
        completion: C,
    ) -> OperationHandle
    where
        S: FnOnce(OpContext) -> Fut,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
        U: Send + 'static,
        E: From<OpError> + Send + 'static,
        C: CompletionHandler<Result<U, E>>,
    {
        let shared = Arc::new(TaskShared {
            name,
            trace_id: generate_trace_id(),
            state: AtomicU8::new(OperationState::Created as u8),
            continuation: AtomicBool::new(false),
            polls: AtomicU64::new(0),
            started_at: Instant::now(),
        });

        let logger = completion.span();
        let span = operation_span(name, &shared.trace_id, &logger);

        let ctx = OpContext {
            shared: Arc::clone(&shared),
            executor: executor.clone(),
            logger,
        };

        let work = executor.work_guard();
        executor.raw_stats().inc_started();
        span.in_scope(|| debug!("operation started"));

        let task = TaskFuture {
            step: Some(Box::pin(step(ctx))),
            slot: CompletionSlot {
                handler: Some(completion),
                executor: executor.clone(),
            },
            shared: Arc::clone(&shared),
            span,
            _work: work,
            _result: PhantomData,
        };

        let join = executor.spawn(task);
        OperationHandle { shared, join }
    }

    /// Start an operation and await its result
    pub async fn run<S, Fut, U, E>(executor: &Executor, name: &'static str, step: S) -> Result<U, E>
    where
        S: FnOnce(OpContext) -> Fut,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
        U: Send + 'static,
        E: From<OpError> + Send + 'static,
    {
        let (continuation, resumed) = Continuation::pair();
        Self::start(executor, name, step, continuation.into_callback());

        match resumed.await {
            Ok(result) => result,
            Err(err) => Err(E::from(err)),
        }
    }
}
