//! `waitpid`/`wait4`: reap zombie children.

extern crate alloc;
use alloc::sync::Arc;

use crate::error::{KernelError, KernelResult};

use super::pcb::{Process, ProcessId, ProcessState};
use super::table;

pub struct WaitResult {
    pub pid: ProcessId,
    pub exit_code: i32,
}

/// Block until a child of `parent` becomes a zombie, matching `target`
/// (`None` = any child), then reap and remove it from the table.
pub fn wait(parent: &Arc<Process>, target: Option<ProcessId>) -> KernelResult<WaitResult> {
    loop {
        let children = table::children_of(parent.pid);
        if children.is_empty() {
            return Err(KernelError::NoChildren);
        }
        let candidates: alloc::vec::Vec<_> = children
            .into_iter()
            .filter(|c| target.is_none_or(|t| t == c.pid))
            .collect();
        if candidates.is_empty() {
            return Err(KernelError::ProcessNotFound { pid: target.unwrap_or(0) });
        }
        for child in &candidates {
            if let ProcessState::Zombie { exit_code } = *child.state.lock() {
                let pid = child.pid;
                table::remove(pid);
                parent.children.lock().retain(|&p| p != pid);
                return Ok(WaitResult { pid, exit_code });
            }
        }
        // None are zombies yet: block on the first candidate's exit event.
        // A real multi-child wait uses Event::wait_any across all of them.
        let events: alloc::vec::Vec<_> = candidates.iter().map(|c| &c.exit_wait).collect();
        crate::sched::event::Event::wait_any(&events);
    }
}
