//! Threads: the unit of scheduling. Wraps [`crate::sched::task::Task`]
//! with the process-level bookkeeping (pending/blocked signal masks)
//! that belongs to component G rather than the scheduler itself.

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use spin::Mutex;

use crate::sched::task::Task;

pub type ThreadId = u64;

/// Global tid -> [`Thread`] registry, so the scheduler's tick path can
/// look up a thread's pending signals without threading it through
/// [`Task`] itself.
static THREADS: Mutex<BTreeMap<ThreadId, Arc<Thread>>> = Mutex::new(BTreeMap::new());

pub fn get(tid: ThreadId) -> Option<Arc<Thread>> {
    THREADS.lock().get(&tid).cloned()
}

/// Per-thread signal state: a 64-bit pending set and a 64-bit blocked
/// (masked) set, per component G.
pub struct SignalState {
    pub pending: Mutex<u64>,
    pub mask: Mutex<u64>,
}

impl SignalState {
    fn new() -> Self {
        Self { pending: Mutex::new(0), mask: Mutex::new(0) }
    }

    pub fn raise(&self, signum: u32) {
        *self.pending.lock() |= 1u64 << (signum as u64 - 1);
    }

    /// Next deliverable signal: pending and not blocked.
    pub fn next_deliverable(&self) -> Option<u32> {
        let deliverable = *self.pending.lock() & !*self.mask.lock();
        if deliverable == 0 {
            None
        } else {
            Some(deliverable.trailing_zeros() + 1)
        }
    }

    pub fn clear(&self, signum: u32) {
        *self.pending.lock() &= !(1u64 << (signum as u64 - 1));
    }
}

pub struct Thread {
    pub task: Arc<Task>,
    pub signals: SignalState,
}

impl Thread {
    pub fn spawn(pid: u64, kernel_stack_top: u64, entry: u64, user_stack: u64) -> Arc<Self> {
        let task = Task::new(pid, kernel_stack_top, entry, user_stack);
        let thread = Arc::new(Self { task: task.clone(), signals: SignalState::new() });
        THREADS.lock().insert(thread.tid(), thread.clone());
        crate::sched::scheduler::spawn(task);
        thread
    }

    pub fn tid(&self) -> ThreadId {
        self.task.tid
    }
}
