/*!
 * Composed Operations
 *
 * Single-owner asynchronous tasks with exactly-once completion.
 *
 * ## Lifecycle
 *
 * ```text
 * Created ──poll──▶ Running ◀──resume──┐
 *                      │               │
 *                      ├──Pending──▶ Suspended
 *                      │
 *                    Ready
 *                      │
 *                  Completed ──handler──▶ Destroyed
 * ```
 *
 * A step is ordinary `async` code: every `.await` on an unfinished future is
 * a suspension, and the scheduler's next poll is the resumption. Transports
 * that report through callbacks are bridged with a [`Continuation`].
 *
 * ## Guarantees
 *
 * - The completion handler runs exactly once, after the step state is gone
 * - A task dropped early (abort, runtime shutdown) still completes, with
 *   `OpError::Abandoned`
 * - Each task keeps its executor busy until it is destroyed
 */

mod completion;
mod continuation;
pub(crate) mod stats;
mod task;

pub use completion::{CompletionExt, CompletionHandler, Logged};
pub use continuation::{Continuation, Resumption};
pub use stats::{OperationStats, OperationStatsSnapshot};
pub use task::{OpContext, Operation, OperationHandle, OperationState};
