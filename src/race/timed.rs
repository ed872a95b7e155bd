/*!
 * Timer Race
 */

use super::{race, Cancel};
use crate::core::deadline::Deadline;
use crate::core::errors::OpError;
use std::future::Future;
use tokio::time::Instant;
use tracing::debug;

/// Run `op` on `resource`, bounded by `deadline`
///
/// `deadline` is a `Duration` measured from the call or an absolute
/// `Instant`. On expiry the resource is cancelled, `op` is drained, and the
/// result is `OpError::Timeout` regardless of what `op` reported.
pub async fn timed<C, F, U, E>(resource: &C, deadline: impl Into<Deadline>, op: F) -> Result<U, E>
where
    C: Cancel + ?Sized,
    F: Future<Output = Result<U, E>>,
    E: From<OpError>,
{
    let start = Instant::now();
    let deadline = deadline.into();
    let budget = deadline.budget(start);

    race(
        resource,
        tokio::time::sleep_until(deadline.instant(start)),
        op,
        |()| {
            let elapsed = start.elapsed();
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "deadline expired"
            );
            OpError::timeout(elapsed, budget)
        },
    )
    .await
}

/// Run `op` on `resource` until the absolute time point `at`
pub async fn timed_until<C, F, U, E>(resource: &C, at: Instant, op: F) -> Result<U, E>
where
    C: Cancel + ?Sized,
    F: Future<Output = Result<U, E>>,
    E: From<OpError>,
{
    timed(resource, Deadline::At(at), op).await
}
