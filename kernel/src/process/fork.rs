//! `fork`: duplicate the calling process.
//!
//! Address-space duplication is [`Pagemap::fork`] (non-copy-on-write, per
//! component C) — this module is the process-table/thread bookkeeping
//! layered on top of it.

extern crate alloc;
use alloc::string::String;
use alloc::sync::Arc;

use crate::error::KernelResult;

use super::pcb::Process;
use super::table;
use super::thread::Thread;
use crate::sched::task::Task;

/// Fork the current process, returning the child's pid to the parent's
/// caller (the child resumes into user space with a `0` return value via
/// the syscall dispatcher, not from this function).
pub fn fork(parent: &Arc<Process>, parent_task: &Arc<Task>) -> KernelResult<Arc<Process>> {
    let child_pagemap = Arc::new(parent.pagemap.fork()?);
    let pid = table::alloc_pid();
    let name = parent.name.lock().clone();
    let child = Process::new(pid, Some(parent.pid), name, child_pagemap);
    *child.cred.lock() = *parent.cred.lock();
    child.pgid.store(parent.getpgrp(), core::sync::atomic::Ordering::Relaxed);
    child.sid.store(parent.getsid(), core::sync::atomic::Ordering::Relaxed);

    let ctx = parent_task.context.lock();
    let kernel_stack_top = parent_task.kernel_stack_top;
    let entry = ctx.rip;
    let stack = ctx.rsp;
    drop(ctx);

    let child_thread = Thread::spawn(pid, kernel_stack_top, entry, stack);
    child.threads.lock().push(child_thread.tid());

    parent.children.lock().push(pid);
    table::insert(child.clone());
    Ok(child)
}
