//! Memory management facade.
//!
//! Wires together the physical frame allocator (§4.A), the kernel virtual
//! address arena (§4.B), and per-process page tables (§4.C) behind the
//! address newtypes used throughout the kernel.

#![allow(dead_code)]

pub mod arena;
pub mod boot_info;
pub mod frame_allocator;
pub mod heap;
pub mod page_fault;
pub mod page_table;
pub mod pagemap;
pub mod user_validation;

pub use frame_allocator::FrameNumber;
pub use pagemap::PAGE_SIZE;

use core::sync::atomic::{AtomicU64, Ordering};

/// Physical memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysicalAddress(pub u64);

impl PhysicalAddress {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Virtual memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualAddress(pub u64);

impl VirtualAddress {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn add(&self, offset: usize) -> Self {
        Self(self.0 + offset as u64)
    }
}

/// Page size options.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Small = 4096,
    Large = 2 * 1024 * 1024,
    Huge = 1024 * 1024 * 1024,
}

/// Page table entry flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFlags(pub u64);

impl PageFlags {
    pub const PRESENT: Self = Self(1 << 0);
    pub const WRITABLE: Self = Self(1 << 1);
    pub const USER: Self = Self(1 << 2);
    pub const WRITE_THROUGH: Self = Self(1 << 3);
    pub const NO_CACHE: Self = Self(1 << 4);
    pub const ACCESSED: Self = Self(1 << 5);
    pub const DIRTY: Self = Self(1 << 6);
    pub const HUGE: Self = Self(1 << 7);
    pub const GLOBAL: Self = Self(1 << 8);
    pub const NO_EXECUTE: Self = Self(1 << 63);
}

impl core::ops::BitOr for PageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitAnd for PageFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

/// HHDM (higher-half direct map) offset established from the Limine boot
/// response; physical memory is accessible at `HHDM_BASE + phys_addr`
/// until a per-process pagemap is activated.
static HHDM_BASE: AtomicU64 = AtomicU64::new(0);

pub fn set_hhdm_base(base: u64) {
    HHDM_BASE.store(base, Ordering::Relaxed);
}

pub fn hhdm_base() -> u64 {
    HHDM_BASE.load(Ordering::Relaxed)
}

pub fn phys_to_virt(addr: PhysicalAddress) -> VirtualAddress {
    VirtualAddress::new(hhdm_base() + addr.as_u64())
}

/// Bring up memory management: consume the boot memory map into the frame
/// allocator, seed the kernel virtual-address arena, and install the heap.
/// Must run once, early, before any other subsystem touches `alloc`.
pub fn init(boot: &boot_info::BootMemoryInfo) {
    set_hhdm_base(boot.hhdm_offset);
    for region in &boot.usable_regions {
        frame_allocator::add_region(region.base, region.len);
    }
    heap::init_heap();
    log::info!(
        "mm: {} usable regions, {} frames total",
        boot.usable_regions.len(),
        frame_allocator::stats().0
    );
}
