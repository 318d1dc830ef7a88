//! Example tests using the custom test framework
//!
//! This demonstrates how to write tests that bypass lang_items conflicts.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(nucleus_kernel::test_runner)]
#![reexport_test_harness_main = "test_main"]

use nucleus_kernel::{kernel_assert, kernel_assert_eq, kernel_test, test_module};

// Example unit tests
test_module!(basic_tests,
    test_addition => {
        let result = 2 + 2;
        kernel_assert_eq!(result, 4);
        Ok(())
    },

    test_memory_allocation => {
        // Test basic memory operations
        let value = 42u32;
        let ptr = &value as *const u32;
        kernel_assert!(!ptr.is_null());
        kernel_assert_eq!(unsafe { *ptr }, 42);
        Ok(())
    }
);

// Example integration tests
test_module!(integration_tests,
    test_process_table_lookup => {
        use nucleus_kernel::process;

        // Looking up a PID that was never allocated must miss cleanly.
        kernel_assert!(process::table::get(u64::MAX).is_none());
        Ok(())
    }
);

// Entry point for test binary
#[no_mangle]
pub extern "C" fn _start() -> ! {
    nucleus_kernel::serial_println!("\n=== Running Example Tests ===\n");

    test_main();

    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    nucleus_kernel::test_panic_handler(info)
}
