//! IPC primitives (component L) not already covered by `fs::pipe` and
//! `fs::file`'s VNode dispatch: the futex keyed-wait mechanism
//! (component K) and the eventfd/inotify VNode kinds named in the Data
//! Model (§3).

pub mod eventfd;
pub mod futex;
pub mod inotify;

pub fn init() {
    log::info!("ipc: futex/eventfd/inotify ready");
}
