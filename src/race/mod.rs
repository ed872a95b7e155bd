/*!
 * Deadline and Signal Races
 *
 * Bound an operation by a timer or by process signals. Whichever trigger
 * fires first cancels the resource the operation runs on, the operation is
 * drained to completion, and the trigger's error is reported.
 *
 * ```text
 *   op ─────────────┐
 *                   ├── op first ──────▶ op's result
 *   trigger ────────┘
 *                   └── trigger first ─▶ resource.cancel()
 *                                         └─▶ drain op ─▶ Timeout / Interrupted
 * ```
 *
 * The resource must not be shared with operations outside the race:
 * cancellation is per resource, not per operation.
 */

mod cancel;
#[cfg(unix)]
mod signal;
mod timed;

pub use cancel::{Cancel, CancelToken};
#[cfg(unix)]
pub use signal::{signalled, SignalSet};
pub use timed::{timed, timed_until};

use crate::core::errors::OpError;
use futures::future::poll_fn;
use std::future::Future;
use std::task::Poll;
use tracing::debug;

/// Race `op` against `trigger`
///
/// `op` is polled once before the trigger, so it has started on the
/// resource before any cancel is issued. An `op` that finishes on that first
/// poll wins even against an expired deadline. From then on the trigger is
/// polled first, and a trigger that becomes ready on the same tick as `op`
/// wins. Once the trigger has won, whatever the drained operation reports
/// (including an abort) is discarded.
async fn race<C, T, F, U, E, M>(resource: &C, trigger: T, op: F, on_fire: M) -> Result<U, E>
where
    C: Cancel + ?Sized,
    T: Future,
    F: Future<Output = Result<U, E>>,
    E: From<OpError>,
    M: FnOnce(T::Output) -> OpError,
{
    tokio::pin!(trigger);
    tokio::pin!(op);

    let first = poll_fn(|cx| match op.as_mut().poll(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;
    if let Some(result) = first {
        return result;
    }

    let fired = tokio::select! {
        biased;
        fired = &mut trigger => fired,
        result = &mut op => return result,
    };

    let err = on_fire(fired);
    debug!(error = %err, "race trigger fired, cancelling resource");
    resource.cancel();

    let drained = op.await;
    debug!(op_succeeded = drained.is_ok(), "operation drained after cancel");
    Err(E::from(err))
}
