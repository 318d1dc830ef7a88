//! Process control block (component H).

extern crate alloc;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use spin::Mutex;

use crate::mm::pagemap::Pagemap;
use super::fd::FdTable;

/// Base address for the bump allocator backing anonymous `mmap`.
const MMAP_BASE: u64 = 0x0000_6000_0000_0000;

pub type ProcessId = u64;
pub type Pgid = u32;
pub type Sid = u32;

/// Unix credentials: `{uid, gid, euid, egid}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
    pub euid: u32,
    pub egid: u32,
}

impl Credentials {
    pub const fn root() -> Self {
        Self { uid: 0, gid: 0, euid: 0, egid: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Zombie { exit_code: i32 },
}

/// 64-bit per-process signal-action table; index is signal number 1..64.
pub struct SignalActions {
    pub handlers: Mutex<[u64; 64]>,
}

impl SignalActions {
    fn new() -> Self {
        Self { handlers: Mutex::new([0; 64]) }
    }
}

pub struct Process {
    pub pid: ProcessId,
    pub parent: Option<ProcessId>,
    pub name: Mutex<String>,
    pub cred: Mutex<Credentials>,
    pub pagemap: Arc<Pagemap>,
    pub state: Mutex<ProcessState>,
    pub threads: Mutex<Vec<u64>>,
    pub children: Mutex<Vec<ProcessId>>,
    pub pgid: AtomicU32,
    pub sid: AtomicU32,
    pub controlling_tty: Mutex<Option<u32>>,
    pub signal_actions: SignalActions,
    pub exit_wait: crate::sched::event::Event,
    pub fd_table: FdTable,
    /// Next free address handed out by anonymous `mmap` (component C).
    pub mmap_cursor: AtomicU64,
}

impl Process {
    pub fn new(pid: ProcessId, parent: Option<ProcessId>, name: String, pagemap: Arc<Pagemap>) -> Arc<Self> {
        Arc::new(Self {
            pid,
            parent,
            name: Mutex::new(name),
            cred: Mutex::new(Credentials::root()),
            pagemap,
            state: Mutex::new(ProcessState::Running),
            threads: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            pgid: AtomicU32::new(pid as u32),
            sid: AtomicU32::new(pid as u32),
            controlling_tty: Mutex::new(None),
            signal_actions: SignalActions::new(),
            exit_wait: crate::sched::event::Event::new(),
            fd_table: FdTable::new(),
            mmap_cursor: AtomicU64::new(MMAP_BASE),
        })
    }

    pub fn is_zombie(&self) -> bool {
        matches!(*self.state.lock(), ProcessState::Zombie { .. })
    }

    pub fn mark_zombie(&self, exit_code: i32) {
        *self.state.lock() = ProcessState::Zombie { exit_code };
        self.exit_wait.post();
    }

    pub fn setpgid(&self, pgid: Pgid) {
        self.pgid.store(pgid, Ordering::Relaxed);
    }

    pub fn getpgrp(&self) -> Pgid {
        self.pgid.load(Ordering::Relaxed)
    }

    /// `setsid`: become a session and process-group leader, detaching
    /// any controlling terminal.
    pub fn setsid(&self) -> Sid {
        let sid = self.pid as u32;
        self.sid.store(sid, Ordering::Relaxed);
        self.pgid.store(sid, Ordering::Relaxed);
        *self.controlling_tty.lock() = None;
        sid
    }

    pub fn getsid(&self) -> Sid {
        self.sid.load(Ordering::Relaxed)
    }
}
