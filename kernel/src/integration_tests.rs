//! Integration tests for inter-subsystem communication.
//!
//! Verifies that process/scheduler/ipc subsystems, not just their
//! individual unit tests, interact correctly end to end.

#![cfg(test)]

use crate::ipc::{eventfd::EventFd, inotify::{Inotify, InotifyMask}};
use crate::process;

/// process::init creates pid 1 with a working address space.
#[test_case]
fn test_process_init_creates_pid_one() {
    let init = process::table::get(1);
    assert!(init.is_some(), "init process should be registered at pid 1");
}

/// fork duplicates the process table entry and parent/child linkage.
#[test_case]
fn test_fork_creates_child_linked_to_parent() {
    let parent = process::table::get(1).expect("init process missing");
    let task = crate::sched::task::Task::new(parent.pid, 0, 0, 0);
    let child = process::fork::fork(&parent, &task).expect("fork failed");

    assert_eq!(child.parent, Some(parent.pid));
    assert!(parent.children.lock().contains(&child.pid));
}

/// wait reaps a zombie child and removes it from the table.
#[test_case]
fn test_wait_reaps_zombie_child() {
    let parent = process::table::get(1).expect("init process missing");
    let task = crate::sched::task::Task::new(parent.pid, 0, 0, 0);
    let child = process::fork::fork(&parent, &task).expect("fork failed");
    let child_pid = child.pid;
    child.mark_zombie(7);

    let result = process::wait::wait(&parent, Some(child_pid)).expect("wait failed");
    assert_eq!(result.pid, child_pid);
    assert_eq!(result.exit_code, 7);
    assert!(process::table::get(child_pid).is_none());
}

/// An eventfd posts are visible across independent handles to the
/// same instance.
#[test_case]
fn test_eventfd_write_then_read() {
    let efd = EventFd::new(0);
    efd.write(5).expect("write failed");
    assert_eq!(efd.read(), 5);
}

/// inotify only queues events for watches whose mask overlaps.
#[test_case]
fn test_inotify_filters_by_mask() {
    let inotify = Inotify::new();
    let wd = inotify.add_watch(42, InotifyMask::MODIFY);
    inotify.notify(42, InotifyMask::ACCESS, None);
    inotify.notify(42, InotifyMask::MODIFY, None);

    let events = inotify.read();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].watch_descriptor, wd);
}
