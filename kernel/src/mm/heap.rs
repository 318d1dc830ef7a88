//! Kernel heap allocator.
//!
//! Backs the global `#[global_allocator]` (see `lib.rs`) with a
//! `linked_list_allocator::LockedHeap` over a static backing array. Real
//! hardware eventually wants this carved from the virtual-address arena
//! instead of a fixed static, but a static region is simpler to reason
//! about for the sizes this kernel currently needs.

#![allow(dead_code)]

pub const HEAP_SIZE: usize = 16 * 1024 * 1024;

static mut HEAP_MEMORY: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

/// Initialize the kernel heap. Must run once, before the first `alloc`
/// call anywhere in the kernel.
pub fn init_heap() {
    unsafe {
        let heap_start = core::ptr::addr_of_mut!(HEAP_MEMORY) as *mut u8;
        crate::get_allocator().lock().init(heap_start, HEAP_SIZE);
    }
    log::info!("mm: kernel heap initialized, {} KiB", HEAP_SIZE / 1024);
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    extern crate alloc;
    use alloc::{boxed::Box, vec::Vec};

    #[test_case]
    fn heap_allocation() {
        let x = Box::new(42);
        assert_eq!(*x, 42);

        let mut v = Vec::new();
        for i in 0..100 {
            v.push(i);
        }
        assert_eq!(v.len(), 100);
    }
}
