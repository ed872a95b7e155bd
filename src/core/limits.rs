/*!
 * Limits and Defaults
 *
 * Centralized location for default deadlines, delays and capacities.
 * Grouped by the subsystem that consumes them.
 */

use std::time::Duration;

// =============================================================================
// REQUEST / REPLY
// =============================================================================

/// Standard reply deadline (1s)
/// Time a transaction waits for its tagged reply before timing out
pub const STANDARD_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Restricted reply deadline (200ms), for development against local peers
pub const RESTRICTED_REPLY_TIMEOUT: Duration = Duration::from_millis(200);

/// Relaxed reply deadline (10s), for slow links
pub const RELAXED_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of resends after a reply timeout
pub const DEFAULT_RETRIES: u32 = 3;

/// Maximum live transactions per multiplexer
/// Bounds the identifier scan on wraparound
pub const DEFAULT_MAX_PENDING: usize = 4096;

// =============================================================================
// TRANSPORT
// =============================================================================

/// Standard connect deadline (10s)
pub const STANDARD_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Standard deadline for writing one frame (5s)
pub const STANDARD_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay a device needs after reconfiguration before it answers (50ms)
pub const STANDARD_SETTLE_DELAY: Duration = Duration::from_millis(50);

// =============================================================================
// SIGNALS
// =============================================================================

/// Signals that interrupt signal-bounded operations by default
pub fn default_signals() -> Vec<i32> {
    use nix::sys::signal::Signal;
    vec![Signal::SIGINT as i32, Signal::SIGTERM as i32]
}
