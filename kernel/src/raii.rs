//! RAII patterns for kernel resources.
//!
//! Generic drop-based guards used across subsystems. Resource-specific
//! guards (frames, pagemap mappings, process teardown) live next to the
//! resource they guard (`mm::frame_allocator`, `process::pcb`) rather
//! than here.

use core::ops::{Deref, DerefMut};

use spin::MutexGuard;

/// RAII lock guard that logs acquisition and release.
pub struct TrackedMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    #[allow(dead_code)]
    name: &'static str,
}

impl<'a, T> TrackedMutexGuard<'a, T> {
    pub fn new(guard: MutexGuard<'a, T>, name: &'static str) -> Self {
        log::trace!("lock acquired: {name}");
        Self { guard, name }
    }
}

impl<T> Drop for TrackedMutexGuard<'_, T> {
    fn drop(&mut self) {
        log::trace!("lock released: {}", self.name);
    }
}

impl<T> Deref for TrackedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for TrackedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Macro to create RAII scope guards.
#[macro_export]
macro_rules! defer {
    ($e:expr) => {
        let _guard = $crate::raii::ScopeGuard::new(|| $e);
    };
}

/// Generic scope guard that runs cleanup code on drop.
pub struct ScopeGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
    pub fn new(cleanup: F) -> Self {
        Self { cleanup: Some(cleanup) }
    }

    /// Cancel the cleanup; it will not run on drop.
    pub fn cancel(mut self) {
        self.cleanup = None;
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn test_scope_guard() {
        let mut cleaned = false;
        {
            let _guard = ScopeGuard::new(|| {
                cleaned = true;
            });
        }
        assert!(cleaned);
    }

    #[test_case]
    fn test_scope_guard_cancel() {
        let mut cleaned = false;
        {
            let guard = ScopeGuard::new(|| {
                cleaned = true;
            });
            guard.cancel();
        }
        assert!(!cleaned);
    }
}
