/*!
 * opflow
 * Composable asynchronous operations over callback-style transports
 *
 * - Operations with exactly-once completion and continuation tracking
 * - Phaser barrier and phaser-serialized writer
 * - Request/reply multiplexer with tagged transactions
 * - Deadline and signal races with coarse cancellation
 */

pub mod config;
pub mod core;
pub mod executor;
pub mod monitoring;
pub mod mux;
pub mod operation;
pub mod phaser;
pub mod race;

// Re-exports
pub use crate::core::errors::*;
pub use crate::core::{CorrelationId, Deadline, WorkExecutor, WorkGuard};
pub use config::RuntimeConfig;
pub use executor::Executor;
pub use monitoring::init_tracing;
pub use mux::{Multiplexer, Tagged, Transaction};
pub use operation::{
    CompletionHandler, Continuation, OpContext, Operation, OperationHandle, OperationState,
    OperationStatsSnapshot, Resumption,
};
pub use phaser::{Branch, Phaser, SerialWriter};
pub use race::{timed, timed_until, Cancel, CancelToken};
#[cfg(unix)]
pub use race::{signalled, SignalSet};
