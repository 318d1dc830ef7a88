//! Preemptive scheduler: one shared global runqueue (component F).
//!
//! Deliberately not per-CPU: every runnable thread lives on a single
//! `VecDeque` guarded by one lock, and any CPU's tick ISR can pick up any
//! ready thread. There is no load balancer and no NUMA awareness — with
//! one shared queue there is nothing to balance.
//!
//! Tick sequence, run by the architecture timer interrupt on each CPU:
//! save the interrupted thread's state, advance the timer list
//! ([`super::timer::tick`]), debit the running thread's timeslice, and if
//! it's exhausted (or a higher-priority thread is ready) pick the next
//! thread and context-switch into it.

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::sync::Arc;

use spin::Mutex;

use super::task::{Task, TaskState, ThreadId, DEFAULT_TIMESLICE};

struct RunQueue {
    ready: VecDeque<Arc<Task>>,
    all: alloc::collections::BTreeMap<ThreadId, Arc<Task>>,
    current: Option<Arc<Task>>,
}

impl RunQueue {
    const fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            all: alloc::collections::BTreeMap::new(),
            current: None,
        }
    }
}

static RUNQUEUE: Mutex<RunQueue> = Mutex::new(RunQueue::new());

/// Register a new thread and place it on the back of the ready queue.
pub fn spawn(task: Arc<Task>) {
    let mut rq = RUNQUEUE.lock();
    rq.all.insert(task.tid, task.clone());
    rq.ready.push_back(task);
}

/// The thread id currently running on this CPU, or `0` if none (idle).
pub fn current_tid() -> ThreadId {
    RUNQUEUE.lock().current.as_ref().map(|t| t.tid).unwrap_or(0)
}

pub fn current() -> Option<Arc<Task>> {
    RUNQUEUE.lock().current.clone()
}

/// Move the named thread from `Blocked` back to the ready queue. A no-op
/// if the thread doesn't exist or isn't blocked (e.g. it already exited).
pub fn wake(tid: ThreadId) {
    let mut rq = RUNQUEUE.lock();
    if let Some(task) = rq.all.get(&tid).cloned() {
        if task.state() == TaskState::Blocked {
            task.set_state(TaskState::Ready);
            rq.ready.push_back(task);
        }
    }
}

/// Mark the current thread `Blocked` and immediately yield the CPU. The
/// thread does not return here until some other code path calls
/// [`wake`] with its tid.
pub fn block_current() {
    {
        let rq = RUNQUEUE.lock();
        if let Some(cur) = &rq.current {
            cur.set_state(TaskState::Blocked);
        }
    }
    yield_now();
}

/// Voluntarily give up the CPU, picking the next ready thread.
pub fn yield_now() {
    tick();
}

/// One scheduler tick: advance the timer list, debit the running
/// thread's timeslice, and context-switch if it's exhausted or blocked.
pub fn tick() {
    super::timer::tick();

    let (prev, next) = {
        let mut rq = RUNQUEUE.lock();
        let prev = rq.current.take();

        if let Some(ref p) = prev {
            if p.state() == TaskState::Running {
                let remaining = p.ticks_left.load(core::sync::atomic::Ordering::Relaxed);
                if remaining > 1 {
                    p.ticks_left
                        .store(remaining - 1, core::sync::atomic::Ordering::Relaxed);
                    rq.current = Some(p.clone());
                    return;
                }
                p.ticks_left
                    .store(DEFAULT_TIMESLICE, core::sync::atomic::Ordering::Relaxed);
                p.set_state(TaskState::Ready);
                rq.ready.push_back(p.clone());
            }
        }

        let next = rq.ready.pop_front();
        if let Some(ref n) = next {
            n.set_state(TaskState::Running);
            rq.current = Some(n.clone());
        }
        (prev, next)
    };

    if let Some(ref next) = next {
        deliver_pending_signal(next);
    }

    if let (Some(prev), Some(next)) = (prev, next) {
        if !Arc::ptr_eq(&prev, &next) {
            switch_context(&prev, &next);
        }
    }
}

/// Before resuming `task`, redirect it into a signal handler if one is
/// deliverable (component G, spec step: tick ISR invokes signal dispatch
/// on resume).
fn deliver_pending_signal(task: &Arc<Task>) {
    let Some(thread) = crate::process::thread::get(task.tid) else {
        return;
    };
    let Some(signum) = thread.signals.next_deliverable() else {
        return;
    };
    let Some(process) = crate::process::table::get(task.pid) else {
        return;
    };
    crate::process::signal::dispatch(&process, &thread, signum);
}

/// Terminate the running thread and yield the CPU permanently; never
/// returns. Used by `exit`/`exit_group` after the process has been
/// marked a zombie.
pub fn exit_current() -> ! {
    let tid = current_tid();
    if tid != 0 {
        terminate(tid);
    }
    loop {
        tick();
    }
}

/// Remove a thread permanently (process exit / thread termination).
pub fn terminate(tid: ThreadId) {
    let mut rq = RUNQUEUE.lock();
    rq.all.remove(&tid);
    rq.ready.retain(|t| t.tid != tid);
    if rq.current.as_ref().map(|t| t.tid) == Some(tid) {
        rq.current = None;
    }
}

fn switch_context(prev: &Arc<Task>, next: &Arc<Task>) {
    let mut prev_ctx = prev.context.lock();
    let next_ctx = next.context.lock();
    crate::arch::x86_64::context::switch_context(&mut prev_ctx, &next_ctx);
}

pub fn ready_len() -> usize {
    RUNQUEUE.lock().ready.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn spawn_enqueues_ready_thread() {
        let before = ready_len();
        let t = Task::new(1, 0, 0, 0);
        spawn(t);
        assert_eq!(ready_len(), before + 1);
    }
}
