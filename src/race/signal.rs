/*!
 * Signal Race
 *
 * Races an operation against delivery of one of a set of process signals.
 * Registering a signal installs a process-wide handler that stays in place
 * for the life of the process.
 */

use super::{race, Cancel};
use crate::core::errors::{OpError, OpResult};
use futures::future::select_all;
use nix::sys::signal::Signal as NixSignal;
use std::future::Future;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, info};

/// Set of process signals to listen for
///
/// Only signals delivered after a number was added are observed.
pub struct SignalSet {
    streams: Vec<(i32, Signal)>,
}

impl SignalSet {
    /// Listen for every signal in `numbers`
    pub fn new(numbers: &[i32]) -> OpResult<Self> {
        let mut set = Self {
            streams: Vec::with_capacity(numbers.len()),
        };
        for &number in numbers {
            set.add(number)?;
        }
        Ok(set)
    }

    /// Start listening for `number`; adding a number twice is a no-op
    pub fn add(&mut self, number: i32) -> OpResult<()> {
        if self.contains(number) {
            return Ok(());
        }

        let named = NixSignal::try_from(number)
            .map_err(|_| OpError::InvalidConfig(format!("unknown signal number {}", number)))?;
        let stream = signal(SignalKind::from_raw(number))?;
        debug!(signal = named.as_str(), "listening for signal");
        self.streams.push((number, stream));
        Ok(())
    }

    pub fn contains(&self, number: i32) -> bool {
        self.streams.iter().any(|(n, _)| *n == number)
    }

    /// Signal numbers in the set, in insertion order
    pub fn numbers(&self) -> Vec<i32> {
        self.streams.iter().map(|(n, _)| *n).collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Wait for the next signal in the set and return its number
    ///
    /// An empty set never resolves.
    pub async fn wait(&mut self) -> i32 {
        if self.streams.is_empty() {
            return std::future::pending().await;
        }

        let receivers = self
            .streams
            .iter_mut()
            .map(|(number, stream)| Box::pin(async move { stream.recv().await.map(|()| *number) }));

        match select_all(receivers).await.0 {
            Some(number) => {
                info!(signal = number, "signal received");
                number
            }
            // Signal driver shut down; nothing more will arrive
            None => std::future::pending().await,
        }
    }
}

impl std::fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSet")
            .field("numbers", &self.numbers())
            .finish()
    }
}

/// Run `op` on `resource` until it finishes or a signal in `signals` arrives
///
/// On a signal the resource is cancelled, `op` is drained, and the result
/// is `OpError::Interrupted` regardless of what `op` reported.
pub async fn signalled<C, F, U, E>(resource: &C, signals: &mut SignalSet, op: F) -> Result<U, E>
where
    C: Cancel + ?Sized,
    F: Future<Output = Result<U, E>>,
    E: From<OpError>,
{
    race(resource, signals.wait(), op, |signal| OpError::Interrupted { signal }).await
}
