/*!
 * Work Guards
 *
 * RAII keep-alive tokens: while a guard exists, its executor counts one
 * unit of outstanding work and will not report itself idle.
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use std::sync::Arc;
use tracing::trace;

/// Executors that track outstanding work
pub trait WorkExecutor: Send + Sync {
    /// One more unit of work is outstanding
    fn on_work_started(&self);

    /// One unit of work finished
    fn on_work_finished(&self);
}

impl<T: WorkExecutor + ?Sized> WorkExecutor for Arc<T> {
    #[inline]
    fn on_work_started(&self) {
        (**self).on_work_started()
    }

    #[inline]
    fn on_work_finished(&self) {
        (**self).on_work_finished()
    }
}

impl<T: WorkExecutor + ?Sized> WorkExecutor for &T {
    #[inline]
    fn on_work_started(&self) {
        (**self).on_work_started()
    }

    #[inline]
    fn on_work_finished(&self) {
        (**self).on_work_finished()
    }
}

/// Keep-alive token for an executor
///
/// Construction calls `on_work_started`, drop calls `on_work_finished`.
/// Cloning registers a second unit of work; moving transfers the single
/// unit without double counting.
///
/// # Example
///
/// ```ignore
/// let guard = WorkGuard::new(executor.clone());
/// let second = guard.clone(); // two units outstanding
/// drop(guard);                // one unit outstanding
/// ```
pub struct WorkGuard<E: WorkExecutor> {
    executor: Option<E>,
    metadata: GuardMetadata,
}

impl<E: WorkExecutor> WorkGuard<E> {
    /// Acquire one unit of work on `executor`
    pub fn new(executor: E) -> Self {
        executor.on_work_started();
        trace!("work guard acquired");
        Self {
            executor: Some(executor),
            metadata: GuardMetadata::new("work"),
        }
    }

    /// Executor this guard keeps alive, if not yet released
    #[inline]
    pub fn executor(&self) -> Option<&E> {
        self.executor.as_ref()
    }

    /// Check whether this guard still holds its unit of work
    #[inline]
    pub fn owns_work(&self) -> bool {
        self.executor.is_some()
    }

    /// Release the unit of work early
    ///
    /// Calling `reset` on an already released guard does nothing.
    pub fn reset(&mut self) {
        if let Some(executor) = self.executor.take() {
            executor.on_work_finished();
            trace!(
                lifetime_us = self.metadata.lifetime_micros(),
                "work guard released"
            );
        }
    }
}

impl<E: WorkExecutor + Clone> Clone for WorkGuard<E> {
    fn clone(&self) -> Self {
        if let Some(executor) = &self.executor {
            executor.on_work_started();
        }
        Self {
            executor: self.executor.clone(),
            metadata: GuardMetadata::new("work"),
        }
    }
}

impl<E: WorkExecutor> Guard for WorkGuard<E> {
    fn resource_type(&self) -> &'static str {
        "work"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.owns_work()
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.owns_work() {
            return Err(GuardError::AlreadyReleased);
        }
        self.reset();
        Ok(())
    }
}

impl<E: WorkExecutor> GuardDrop for WorkGuard<E> {
    fn on_drop(&mut self) {
        self.reset();
    }
}

impl<E: WorkExecutor> Drop for WorkGuard<E> {
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl<E: WorkExecutor> std::fmt::Debug for WorkGuard<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkGuard")
            .field("owns_work", &self.owns_work())
            .finish()
    }
}
