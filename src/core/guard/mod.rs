/*!
 * RAII Resource Guards
 *
 * Scoped guards with automatic cleanup on every exit path.
 *
 * ## Guard Types
 *
 * - **WorkGuard**: keeps an executor from going idle while it exists
 *
 * ## Example
 *
 * ```ignore
 * let guard = WorkGuard::new(executor.clone());
 * // executor.outstanding_work() >= 1
 * drop(guard);
 * // unit of work released
 * ```
 */

mod traits;
mod work;

pub use traits::{Guard, GuardDrop};
pub use work::{WorkExecutor, WorkGuard};

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
