//! Process/thread model (component H): fork/exec/wait, process groups
//! and sessions, and the credentials (§3 supplement) used by VFS
//! permission checks.

extern crate alloc;
use alloc::string::String;
use alloc::sync::Arc;

pub mod exec;
pub mod fd;
pub mod fork;
pub mod pcb;
pub mod signal;
pub mod table;
pub mod thread;
pub mod wait;

pub use pcb::{Credentials, Process, ProcessId, ProcessState};
pub use thread::{Thread, ThreadId};

use crate::mm::pagemap::Pagemap;

pub fn init() {
    table::init();
    let pagemap = Arc::new(Pagemap::new().expect("failed to allocate init's address space"));
    let pid = table::alloc_pid();
    let init_process = Process::new(pid, None, String::from("init"), pagemap);
    table::insert(init_process);
    log::info!("process: init process created with pid {pid}");
}

/// The process owning the currently running thread, if any.
pub fn current_process() -> Option<Arc<Process>> {
    let tid = crate::sched::scheduler::current_tid();
    if tid == 0 {
        return None;
    }
    let task = crate::sched::scheduler::current()?;
    table::get(task.pid)
}

/// The current thread's address space. Used by the page-fault handler
/// and by futex key resolution.
pub fn current_pagemap() -> Option<Arc<Pagemap>> {
    current_process().map(|p| p.pagemap.clone())
}

/// The currently running scheduler [`Task`](crate::sched::task::Task),
/// if any (idle/kernel tasks aren't bound to a process).
pub fn current_task() -> Option<Arc<crate::sched::task::Task>> {
    crate::sched::scheduler::current()
}

/// Terminate the calling thread's process with `exit_code`, marking it
/// a zombie for `wait`/`wait4` to reap and waking anyone blocked on it.
pub fn exit_current(exit_code: i32) {
    if let Some(process) = current_process() {
        process.mark_zombie(exit_code);
    }
    crate::sched::scheduler::exit_current();
}
