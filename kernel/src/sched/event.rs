//! Event: the universal wait/wake primitive (component D).
//!
//! An `Event` is a pending count plus a list of waiting threads. Posting
//! increments the pending count and wakes waiters (up to the post
//! amount); waiting either consumes an already-pending post immediately
//! or blocks until one arrives. Every higher-level blocking primitive in
//! the kernel — futex, pipe readers/writers, timers, `waitpid` — is built
//! on this one mechanism, per the "single universal wait/wake" design.

extern crate alloc;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use super::task::ThreadId;

struct Inner {
    pending: usize,
    waiters: Vec<ThreadId>,
}

/// A cheaply-cloneable handle to one wait/wake point. Clones share the
/// same underlying queue — cloning an `Event` does not create a new one.
#[derive(Clone)]
pub struct Event {
    inner: Arc<Mutex<Inner>>,
}

impl Event {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { pending: 0, waiters: Vec::new() })),
        }
    }

    /// Returns another handle to the same event (for storing per-key
    /// event handles, e.g. in the futex table, without holding a lock
    /// across a blocking wait).
    pub fn clone_handle(&self) -> Self {
        self.clone()
    }

    /// Increment the pending count by one and wake one waiter if any are
    /// queued.
    pub fn post(&self) {
        let mut inner = self.inner.lock();
        inner.pending += 1;
        if let Some(tid) = inner.waiters.pop() {
            super::scheduler::wake(tid);
        }
    }

    /// Wake up to `n` waiters without touching the pending count (used by
    /// futex, which has "spurious wake" semantics rather than counted
    /// posts).
    pub fn wake_n(&self, n: usize) -> usize {
        let mut inner = self.inner.lock();
        let count = n.min(inner.waiters.len());
        for _ in 0..count {
            if let Some(tid) = inner.waiters.pop() {
                super::scheduler::wake(tid);
            }
        }
        count
    }

    /// Block the current thread until this event is posted (or a pending
    /// post is already available, which is consumed immediately).
    pub fn wait_one(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.pending > 0 {
                inner.pending -= 1;
                return;
            }
            let tid = super::scheduler::current_tid();
            inner.waiters.push(tid);
        }
        super::scheduler::block_current();
    }

    /// Block on the first of several events to be posted; returns the
    /// index of the one that woke us. Used for e.g. `select`/`poll`-style
    /// multi-wait across several file descriptors' readiness events.
    pub fn wait_any(events: &[&Event]) -> usize {
        loop {
            for (i, ev) in events.iter().enumerate() {
                let mut inner = ev.inner.lock();
                if inner.pending > 0 {
                    inner.pending -= 1;
                    return i;
                }
            }
            let tid = super::scheduler::current_tid();
            for ev in events {
                ev.inner.lock().waiters.push(tid);
            }
            super::scheduler::block_current();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn post_before_wait_is_consumed_immediately() {
        let ev = Event::new();
        ev.post();
        assert_eq!(ev.pending_count(), 1);
        ev.wait_one();
        assert_eq!(ev.pending_count(), 0);
    }
}
