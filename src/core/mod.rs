/*!
 * Core Module
 * Fundamental types, errors, guards and limits
 */

pub mod deadline;
pub mod errors;
pub mod guard;
pub mod id;
pub mod limits;

// Re-export for convenience
pub use deadline::Deadline;
pub use errors::*;
pub use guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult, WorkExecutor, WorkGuard};
pub use id::{CorrelationId, WrappingGenerator};
