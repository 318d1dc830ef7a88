#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![feature(abi_x86_interrupt)]
#![test_runner(crate::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

#[macro_use]
mod print;

mod arch;
mod elf;
mod error;
mod fs;
mod ipc;
mod mm;
mod net;
mod process;
mod sched;
mod syscall;

use limine::BaseRevision;

#[used]
#[link_section = ".requests"]
static BASE_REVISION: BaseRevision = BaseRevision::new();

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    println!("[KERNEL PANIC] {}", _info);
    arch::halt();
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("[KERNEL PANIC] {}", info);
    exit_qemu(QemuExitCode::Failed);
}

/// Early init (component O): consume the Limine boot handoff, bring up
/// memory management, then the scheduler and the rest of the subsystem
/// tree, in dependency order.
#[no_mangle]
pub extern "C" fn _start() -> ! {
    assert!(BASE_REVISION.is_supported());

    println!("nucleus v{}", env!("CARGO_PKG_VERSION"));
    println!("early init: consuming boot handoff");

    arch::init();

    let boot = mm::boot_info::collect();
    mm::init(&boot);

    if let Err(e) = arch::acpi::init(boot.rsdp_addr) {
        println!("acpi: {e}, continuing with legacy PIC/PIT defaults");
    }

    sched::init();
    process::init();
    fs::init();
    net::init().expect("network init failed");
    syscall::init();

    #[cfg(test)]
    test_main();

    println!("nucleus initialized successfully");

    sched::run();
}

#[cfg(test)]
fn test_runner(tests: &[&dyn Testable]) {
    serial_println!("Running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    exit_qemu(QemuExitCode::Success);
}

#[cfg(test)]
trait Testable {
    fn run(&self) -> ();
}

#[cfg(test)]
impl<T> Testable for T
where
    T: Fn(),
{
    fn run(&self) {
        serial_print!("{}...\t", core::any::type_name::<T>());
        self();
        serial_println!("[ok]");
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

#[cfg(test)]
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    use x86_64::instructions::port::Port;

    unsafe {
        let mut port = Port::new(0xf4);
        port.write(exit_code as u32);
    }
    unreachable!();
}
