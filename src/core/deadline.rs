/*!
 * Deadlines
 *
 * A deadline is either relative to the moment a race starts or an absolute
 * time point. Both resolve against tokio's clock so paused-time tests see
 * the same instant the timer does.
 */

use std::time::Duration;
use tokio::time::Instant;

/// Relative or absolute deadline for a race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Expires this long after the race starts
    After(Duration),

    /// Expires at a fixed time point
    At(Instant),
}

impl Deadline {
    /// Resolve to an absolute instant, given when the race starts
    #[inline]
    pub fn instant(&self, start: Instant) -> Instant {
        match *self {
            Self::After(d) => start + d,
            Self::At(at) => at,
        }
    }

    /// Time budget between `start` and expiry (zero if already expired)
    #[inline]
    pub fn budget(&self, start: Instant) -> Duration {
        self.instant(start).saturating_duration_since(start)
    }

    /// Check if the deadline has passed
    #[inline]
    pub fn is_expired(&self, start: Instant) -> bool {
        Instant::now() >= self.instant(start)
    }
}

impl From<Duration> for Deadline {
    fn from(d: Duration) -> Self {
        Self::After(d)
    }
}

impl From<Instant> for Deadline {
    fn from(at: Instant) -> Self {
        Self::At(at)
    }
}

impl From<std::time::Instant> for Deadline {
    fn from(at: std::time::Instant) -> Self {
        Self::At(Instant::from_std(at))
    }
}
