//! `inotify`: filesystem change notification, modeled as a VNode kind
//! (§3) that queues [`InotifyEvent`]s and exposes an [`Event`] readiness
//! signal for `read`/`poll`, same as [`super::eventfd::EventFd`].

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicI32, Ordering};

use spin::Mutex;

use crate::sched::event::Event;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InotifyMask: u32 {
        const ACCESS = 0x0001;
        const MODIFY = 0x0002;
        const ATTRIB = 0x0004;
        const CREATE = 0x0100;
        const DELETE = 0x0200;
        const DELETE_SELF = 0x0400;
        const MOVE_SELF = 0x0800;
    }
}

#[derive(Debug, Clone)]
pub struct InotifyEvent {
    pub watch_descriptor: i32,
    pub mask: InotifyMask,
    pub name: Option<String>,
}

pub struct Watch {
    pub wd: i32,
    pub vnode_id: u64,
    pub mask: InotifyMask,
}

pub struct Inotify {
    next_wd: AtomicI32,
    watches: Mutex<BTreeMap<i32, Watch>>,
    queue: Mutex<Vec<InotifyEvent>>,
    pub readable: Event,
}

impl Inotify {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_wd: AtomicI32::new(1),
            watches: Mutex::new(BTreeMap::new()),
            queue: Mutex::new(Vec::new()),
            readable: Event::new(),
        })
    }

    pub fn add_watch(&self, vnode_id: u64, mask: InotifyMask) -> i32 {
        let wd = self.next_wd.fetch_add(1, Ordering::Relaxed);
        self.watches.lock().insert(wd, Watch { wd, vnode_id, mask });
        wd
    }

    pub fn rm_watch(&self, wd: i32) {
        self.watches.lock().remove(&wd);
    }

    /// Called by the VFS resolver/writer path whenever a watched vnode
    /// changes; queues a matching event for every watch whose mask
    /// overlaps `event_mask`.
    pub fn notify(&self, vnode_id: u64, event_mask: InotifyMask, name: Option<String>) {
        let watches = self.watches.lock();
        let mut queue = self.queue.lock();
        for watch in watches.values() {
            if watch.vnode_id == vnode_id && watch.mask.intersects(event_mask) {
                queue.push(InotifyEvent { watch_descriptor: watch.wd, mask: event_mask, name: name.clone() });
            }
        }
        if !queue.is_empty() {
            drop(queue);
            drop(watches);
            self.readable.post();
        }
    }

    pub fn read(&self) -> Vec<InotifyEvent> {
        self.readable.wait_one();
        core::mem::take(&mut *self.queue.lock())
    }
}
