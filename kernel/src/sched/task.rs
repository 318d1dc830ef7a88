//! Thread control block.

extern crate alloc;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use spin::Mutex;

pub type ThreadId = u64;
pub type ProcessId = u64;

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

pub fn alloc_tid() -> ThreadId {
    NEXT_TID.fetch_add(1, Ordering::Relaxed)
}

/// Scheduling priority, lower value runs first within the same queue.
pub type Priority = u8;

pub const DEFAULT_PRIORITY: Priority = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Ready = 0,
    Running = 1,
    Blocked = 2,
    Zombie = 3,
}

use crate::arch::x86_64::context::X86_64Context;

/// One schedulable thread.
pub struct Task {
    pub tid: ThreadId,
    pub pid: ProcessId,
    pub priority: Priority,
    state: AtomicU8,
    pub context: Mutex<X86_64Context>,
    pub kernel_stack_top: u64,
    /// Remaining timeslice in scheduler ticks, debited by the tick ISR.
    pub ticks_left: AtomicU64,
}

impl Task {
    pub fn new(pid: ProcessId, kernel_stack_top: u64, entry: u64, stack: u64) -> Arc<Self> {
        let ctx = X86_64Context::new(entry as usize, stack as usize);
        Arc::new(Self {
            tid: alloc_tid(),
            pid,
            priority: DEFAULT_PRIORITY,
            state: AtomicU8::new(TaskState::Ready as u8),
            context: Mutex::new(ctx),
            kernel_stack_top,
            ticks_left: AtomicU64::new(DEFAULT_TIMESLICE),
        })
    }

    pub fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            0 => TaskState::Ready,
            1 => TaskState::Running,
            2 => TaskState::Blocked,
            _ => TaskState::Zombie,
        }
    }

    pub fn set_state(&self, s: TaskState) {
        self.state.store(s as u8, Ordering::Release);
    }
}

pub const DEFAULT_TIMESLICE: u64 = 10;
