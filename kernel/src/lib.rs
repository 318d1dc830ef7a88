//! nucleus kernel library.
//!
//! Exposes the kernel's subsystems as a library crate so integration
//! tests and benchmarks under `kernel/tests`/`kernel/benches` can link
//! against them directly, alongside the `_start` binary entry in
//! `main.rs`.

#![no_std]
#![cfg_attr(all(test, target_os = "none"), no_main)]
#![feature(custom_test_frameworks)]
#![feature(abi_x86_interrupt)]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]
#![cfg_attr(target_os = "none", test_runner(crate::test_runner))]
#![cfg_attr(target_os = "none", reexport_test_harness_main = "test_main")]

#[cfg(feature = "alloc")]
extern crate alloc;

// On bare metal, back the global allocator with the kernel heap
// (`mm::heap`). On the host target (used for `cargo test`), delegate to
// the system allocator so ordinary test code can allocate normally.
#[cfg(target_os = "none")]
use linked_list_allocator::LockedHeap;

#[cfg(target_os = "none")]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

/// Get a reference to the global allocator.
#[cfg(target_os = "none")]
pub fn get_allocator() -> &'static LockedHeap {
    &ALLOCATOR
}

#[macro_use]
pub mod print;

mod intrinsics;

pub mod arch;
pub mod elf;
pub mod error;
pub mod fs;
pub mod ipc;
pub mod irq;
pub mod log_service;
pub mod mm;
pub mod net;
pub mod process;
pub mod raii;
pub mod sched;
pub mod serial;
pub mod sync;
mod syscall;
pub mod utils;

mod test_framework;

#[cfg(test)]
mod integration_tests;

pub mod bench;

pub use mm::FrameNumber;
pub use sched::{Priority, SchedClass, Task};
#[cfg(test)]
pub use test_framework::test_runner;
pub use test_framework::{
    cycles_to_ns, exit_qemu, read_timestamp, test_panic_handler, BenchmarkRunner, QemuExitCode,
    Testable,
};

#[cfg(all(test, target_os = "none"))]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    test_main();
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(all(test, target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    test_framework::test_panic_handler(info)
}

/// Heap allocation error handler.
///
/// Panic is intentional: heap allocation failure in a no_std kernel is
/// unrecoverable. The alloc_error_handler ABI requires `-> !`.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("Allocation error: {:?}", layout);
}
