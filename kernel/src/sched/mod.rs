//! Scheduler (component F): a single shared global runqueue, the
//! [`event::Event`] wait/wake primitive (component D), and the armed
//! single-shot [`timer`] list (component E).

pub mod block_io;
pub mod event;
pub mod scheduler;
pub mod task;
pub mod timer;

pub use task::{Priority, Task, ThreadId};

/// Scheduling class. Every thread in this kernel is `Normal` — there is
/// no realtime class and no separate idle class, since the single shared
/// runqueue has nothing to segregate them from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedClass {
    Normal,
}

pub fn init() {
    log::info!("sched: single shared runqueue initialized");
}

/// Enter the scheduler's main loop. Never returns; the architecture
/// timer interrupt drives [`scheduler::tick`] from here on.
pub fn run() -> ! {
    loop {
        if scheduler::ready_len() == 0 {
            x86_64::instructions::hlt();
        } else {
            scheduler::yield_now();
        }
    }
}
