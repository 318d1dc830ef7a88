//! Futex: fast userspace mutex (component K).
//!
//! Keyed by the futex word's *physical* address rather than its virtual
//! address, so two threads in different address spaces mapping the same
//! shared-memory page to different virtual addresses still rendezvous on
//! the same wait queue. `futex_wait`/`futex_wake` build directly on the
//! [`crate::sched::event::Event`] primitive (component D) — a futex is
//! just an `Event` keyed by physical address, with no state of its own
//! beyond the waiter list.

extern crate alloc;
use alloc::collections::BTreeMap;

use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::mm::PhysicalAddress;
use crate::sched::event::Event;

struct FutexTable {
    events: BTreeMap<u64, Event>,
}

impl FutexTable {
    const fn new() -> Self {
        Self { events: BTreeMap::new() }
    }

    fn event_for(&mut self, key: u64) -> &Event {
        self.events.entry(key).or_insert_with(Event::new)
    }
}

static TABLE: Mutex<FutexTable> = Mutex::new(FutexTable::new());

/// Resolve a futex word's user virtual address to the physical address
/// that keys its wait queue, via the current thread's pagemap.
fn futex_key(uaddr: u64) -> KernelResult<u64> {
    let pagemap = crate::process::current_pagemap()
        .ok_or(KernelError::NotInitialized { subsystem: "pagemap" })?;
    let phys = pagemap
        .get_physical_addr(uaddr)
        .ok_or(KernelError::UnmappedMemory { addr: uaddr as usize })?;
    Ok(phys.as_u64())
}

/// `FUTEX_WAIT`: if `*uaddr == expected`, block until woken or a matching
/// `futex_wake`. Returns `Ok(())` once woken, `Err(WouldBlock)`-free — the
/// value check racing a concurrent writer is the caller's
/// (`sys_futex`'s) responsibility to perform atomically before calling in.
pub fn wait(uaddr: u64) -> KernelResult<()> {
    let key = futex_key(uaddr)?;
    let event = {
        let mut table = TABLE.lock();
        table.event_for(key).clone_handle()
    };
    event.wait_one();
    Ok(())
}

/// `FUTEX_WAKE`: wake up to `max_waiters` threads blocked on this word.
/// Returns the number actually woken.
pub fn wake(uaddr: u64, max_waiters: usize) -> KernelResult<usize> {
    let key = futex_key(uaddr)?;
    let table = TABLE.lock();
    let Some(event) = table.events.get(&key) else {
        return Ok(0);
    };
    Ok(event.wake_n(max_waiters))
}

/// Drop the table entry for `phys_key` once no thread references the
/// physical page anymore (called on final unmap), so the table doesn't
/// grow unbounded over the kernel's lifetime.
pub fn reclaim(phys_key: PhysicalAddress) {
    TABLE.lock().events.remove(&phys_key.as_u64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn table_creates_event_on_demand() {
        let mut table = FutexTable::new();
        let _ = table.event_for(0x1000);
        assert!(table.events.contains_key(&0x1000));
    }
}
