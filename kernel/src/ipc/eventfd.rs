//! `eventfd`: a VNode kind wrapping a 64-bit counter and an [`Event`],
//! per the Data Model (§3) — no separate API, just another file
//! description the VFS dispatches `read`/`write`/`poll` to.

extern crate alloc;
use alloc::sync::Arc;

use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{KernelError, KernelResult};
use crate::sched::event::Event;

pub struct EventFd {
    counter: AtomicU64,
    pub readable: Event,
}

impl EventFd {
    pub fn new(initval: u64) -> Arc<Self> {
        let ev = Event::new();
        if initval > 0 {
            ev.post();
        }
        Arc::new(Self { counter: AtomicU64::new(initval), readable: ev })
    }

    /// `read`: block until the counter is non-zero, then return and reset
    /// it to zero (matching the non-`EFD_SEMAPHORE` default).
    pub fn read(&self) -> u64 {
        self.readable.wait_one();
        self.counter.swap(0, Ordering::AcqRel)
    }

    /// `write`: add `value` to the counter, failing if it would overflow
    /// `u64::MAX - 1` as Linux's eventfd does.
    pub fn write(&self, value: u64) -> KernelResult<()> {
        let prev = self.counter.fetch_add(value, Ordering::AcqRel);
        if prev.checked_add(value).is_none() {
            return Err(KernelError::InvalidArgument { name: "value", value: "overflow" });
        }
        self.readable.post();
        Ok(())
    }
}
