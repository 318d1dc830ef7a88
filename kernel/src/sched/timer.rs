//! Timer: single-shot deadlines armed on a global list (component E).
//!
//! Unlike the teacher's original hierarchical timer wheel, this is a flat
//! list of armed timers, each debited by one tick per scheduler tick
//! (component F's tick ISR calls [`tick`] once per interrupt). When a
//! timer's remaining ticks reach zero it posts its [`Event`] and is
//! removed. Flat and O(n) per tick, which is fine at kernel timer-list
//! scale (sleeps, futex timeouts, TCP retransmit deadlines) — there is no
//! need for a wheel's amortized O(1) insert here.

extern crate alloc;
use alloc::vec::Vec;

use spin::Mutex;

use super::event::Event;

struct ArmedTimer {
    ticks_remaining: u64,
    event: Event,
}

static TIMERS: Mutex<Vec<ArmedTimer>> = Mutex::new(Vec::new());

/// Arm a new single-shot timer for `ticks` scheduler ticks from now,
/// returning the [`Event`] that fires when it expires.
pub fn arm(ticks: u64) -> Event {
    let event = Event::new();
    TIMERS.lock().push(ArmedTimer {
        ticks_remaining: ticks.max(1),
        event: event.clone_handle(),
    });
    event
}

/// Called once per scheduler tick. Debits every armed timer and posts +
/// removes any that reach zero.
pub fn tick() {
    let mut timers = TIMERS.lock();
    let mut i = 0;
    while i < timers.len() {
        timers[i].ticks_remaining = timers[i].ticks_remaining.saturating_sub(1);
        if timers[i].ticks_remaining == 0 {
            let expired = timers.swap_remove(i);
            expired.event.post();
        } else {
            i += 1;
        }
    }
}

pub fn armed_count() -> usize {
    TIMERS.lock().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn timer_fires_after_n_ticks() {
        let ev = arm(3);
        tick();
        tick();
        assert_eq!(ev.pending_count(), 0);
        tick();
        assert_eq!(ev.pending_count(), 1);
    }
}
