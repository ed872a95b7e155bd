/*!
 * Error Types
 * Centralized error handling with thiserror and miette diagnostics
 */

use miette::Diagnostic;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for composed operations
pub type OpResult<T> = Result<T, OpError>;

/// Terminal errors delivered through an operation's completion channel
///
/// Usage errors (resuming a continuation twice, completing a task twice,
/// underflowing a phaser) are not represented here: they are assertions.
#[derive(Error, Debug, Diagnostic)]
pub enum OpError {
    #[error("Operation timed out after {elapsed_ms}ms (deadline {timeout_ms}ms)")]
    #[diagnostic(
        code(op::timeout),
        help("The peer did not answer in time. Retry with a fresh transaction or raise the deadline.")
    )]
    Timeout { elapsed_ms: u64, timeout_ms: u64 },

    #[error("Operation interrupted by signal {signal}")]
    #[diagnostic(
        code(op::interrupted),
        help("A tracked process signal was delivered while the operation was in flight.")
    )]
    Interrupted { signal: i32 },

    #[error("Unexpected reply: expected {expected}, got {actual}")]
    #[diagnostic(
        code(op::unexpected_reply),
        help("The peer answered with a different reply shape. This is not retried automatically.")
    )]
    UnexpectedReply { expected: String, actual: String },

    #[error("Operation aborted")]
    #[diagnostic(
        code(op::aborted),
        help("The underlying resource was cancelled while the operation was outstanding.")
    )]
    Aborted,

    #[error("Operation abandoned before completion")]
    #[diagnostic(
        code(op::abandoned),
        help("The task was dropped without completing. Check for aborted handles or runtime shutdown.")
    )]
    Abandoned,

    #[error("Too many pending transactions (limit {limit})")]
    #[diagnostic(
        code(mux::too_many_pending),
        help("Every correlation identifier is in use. Drop finished transactions or raise max_pending.")
    )]
    TooManyPending { limit: usize },

    #[error("Reply slot already consumed")]
    #[diagnostic(
        code(mux::slot_consumed),
        help("Reset the transaction before waiting for another reply.")
    )]
    SlotConsumed,

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(config::invalid))]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(op::io))]
    Io(#[from] io::Error),
}

impl OpError {
    /// Build a timeout error from the elapsed time and the deadline budget
    pub fn timeout(elapsed: Duration, budget: Duration) -> Self {
        Self::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
            timeout_ms: budget.as_millis() as u64,
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    #[inline]
    pub fn is_unexpected_reply(&self) -> bool {
        matches!(self, Self::UnexpectedReply { .. })
    }
}

/// Lets transports that speak `io::Result` use the wrappers directly
impl From<OpError> for io::Error {
    fn from(err: OpError) -> Self {
        let kind = match &err {
            OpError::Io(inner) => return io::Error::new(inner.kind(), inner.to_string()),
            OpError::Timeout { .. } => io::ErrorKind::TimedOut,
            OpError::Interrupted { .. } => io::ErrorKind::Interrupted,
            OpError::UnexpectedReply { .. } => io::ErrorKind::InvalidData,
            OpError::Aborted | OpError::Abandoned => io::ErrorKind::ConnectionAborted,
            OpError::TooManyPending { .. } => io::ErrorKind::WouldBlock,
            OpError::SlotConsumed => io::ErrorKind::Other,
            OpError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
