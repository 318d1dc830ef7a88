//! Global process table: PID → [`Process`] lookup.

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::pcb::{Process, ProcessId};

static NEXT_PID: AtomicU64 = AtomicU64::new(1);
static TABLE: Mutex<BTreeMap<ProcessId, Arc<Process>>> = Mutex::new(BTreeMap::new());

pub fn alloc_pid() -> ProcessId {
    NEXT_PID.fetch_add(1, Ordering::Relaxed)
}

pub fn insert(process: Arc<Process>) {
    TABLE.lock().insert(process.pid, process);
}

pub fn get(pid: ProcessId) -> Option<Arc<Process>> {
    TABLE.lock().get(&pid).cloned()
}

pub fn remove(pid: ProcessId) -> Option<Arc<Process>> {
    TABLE.lock().remove(&pid)
}

pub fn children_of(pid: ProcessId) -> alloc::vec::Vec<Arc<Process>> {
    TABLE
        .lock()
        .values()
        .filter(|p| p.parent == Some(pid))
        .cloned()
        .collect()
}

/// All live PIDs, ascending. Used by `/proc` to enumerate process
/// directories.
pub fn all_pids() -> alloc::vec::Vec<ProcessId> {
    TABLE.lock().keys().copied().collect()
}

pub fn init() {
    log::info!("process: table initialized");
}
