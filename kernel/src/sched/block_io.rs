//! Async block-I/O completion (component J).
//!
//! Grounded in the reference kernel's `klib/coroutine.hpp` +
//! `klib/async.hpp`: an I/O initiator hands out an awaitable that a
//! completion callback (interrupt handler, DMA completion, etc.) later
//! resolves; callers either poll it from within another coroutine or
//! block the calling thread on it synchronously via `sync()`/`wait()`.
//!
//! This kernel has no executor or `Waker` plumbing, so rather than
//! translate C++ coroutine frames we express the same shape on top of
//! the existing [`Event`] wait/wake primitive: one single-shot
//! completion slot per request, posted exactly once. Per the design note
//! this is the *only* path block device drivers use — there is no
//! separate synchronous duplicate to keep in sync with it.

extern crate alloc;
use alloc::sync::Arc;

use spin::Mutex;

use super::event::Event;

struct Inner<T> {
    event: Event,
    result: Mutex<Option<T>>,
}

/// A single-shot completion slot for one outstanding block-I/O request.
///
/// `BlockRequest` is the producer side: the driver creates one, hands
/// clones (or the `Arc`) to whatever completes it, and the issuing
/// thread calls [`BlockRequest::wait`] to block until `complete` runs.
pub struct BlockRequest<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BlockRequest<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> BlockRequest<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner { event: Event::new(), result: Mutex::new(None) }),
        }
    }

    /// Resolve the request. Called from the completion side (interrupt
    /// handler or driver callback) exactly once per request.
    pub fn complete(&self, result: T) {
        *self.inner.result.lock() = Some(result);
        self.inner.event.post();
    }

    /// Block the calling thread until `complete` has run, then return
    /// its result. Mirrors the reference implementation's `klib::sync`.
    pub fn wait(&self) -> T {
        loop {
            if let Some(result) = self.inner.result.lock().take() {
                return result;
            }
            self.inner.event.wait_one();
        }
    }
}

impl<T> Default for BlockRequest<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn test_complete_before_wait() {
        let req: BlockRequest<u32> = BlockRequest::new();
        req.complete(42);
        assert_eq!(req.wait(), 42);
    }

    #[test_case]
    fn test_clone_shares_completion() {
        let req: BlockRequest<u32> = BlockRequest::new();
        let other = req.clone();
        other.complete(7);
        assert_eq!(req.wait(), 7);
    }
}
