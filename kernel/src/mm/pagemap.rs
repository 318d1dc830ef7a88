//! Per-process address space (component C).
//!
//! A [`Pagemap`] owns one process's page table root and the list of
//! [`MappedRange`]s carved out of its address space. Ranges are either
//! `Direct` (backed by frames chosen up front, e.g. identity-ish kernel
//! mappings or a loaded ELF segment with a pre-populated frame list) or
//! `Anonymous` (demand-paged: frames are allocated lazily on first
//! fault). Forking copies the range list and allocates fresh frames for
//! every anonymous range eagerly — there is no copy-on-write here.

#![allow(dead_code)]

extern crate alloc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::error::{KernelError, KernelResult};

use super::page_table::{ActivePageTable, PageTableHierarchy};
use super::{frame_allocator, hhdm_base, FrameNumber, PageFlags, PhysicalAddress, VirtualAddress};

/// Which strategy backs a [`MappedRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Frames are already chosen; `frames[i]` backs `base + i * PAGE_SIZE`.
    Direct,
    /// Frames are allocated lazily on the first page fault in-range.
    Anonymous,
}

pub const PAGE_SIZE: u64 = 4096;

/// One contiguous mapped region of a process's address space.
#[derive(Clone)]
pub struct MappedRange {
    pub base: u64,
    pub page_count: usize,
    pub kind: MappingKind,
    pub flags: PageFlags,
    /// Per-page frame, populated eagerly for `Direct` and lazily (on
    /// fault) for `Anonymous`. `None` means "not yet backed".
    frames: Vec<Option<FrameNumber>>,
}

impl MappedRange {
    fn new(base: u64, page_count: usize, kind: MappingKind, flags: PageFlags) -> Self {
        Self {
            base,
            page_count,
            kind,
            flags,
            frames: alloc::vec![None; page_count],
        }
    }

    pub fn end(&self) -> u64 {
        self.base + (self.page_count as u64) * PAGE_SIZE
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    fn page_index(&self, addr: u64) -> usize {
        ((addr - self.base) / PAGE_SIZE) as usize
    }
}

/// A process's address space: one L4 page table plus the ranges mapped
/// into it.
pub struct Pagemap {
    hierarchy: PageTableHierarchy,
    ranges: Mutex<Vec<MappedRange>>,
}

impl Pagemap {
    /// Allocate a fresh, empty address space (a new L4 table with no
    /// user-space ranges; kernel-space mappings are installed separately
    /// by early init into every table).
    pub fn new() -> KernelResult<Self> {
        let hierarchy = PageTableHierarchy::new()
            .map_err(|_| frame_allocator::oom_error(4096))?;
        Ok(Self {
            hierarchy,
            ranges: Mutex::new(Vec::new()),
        })
    }

    pub fn l4_phys(&self) -> PhysicalAddress {
        self.hierarchy.l4_addr()
    }

    /// Switch the CPU to this address space.
    pub fn activate(&self) {
        let table = unsafe { ActivePageTable::from_l4(self.hierarchy.l4_addr()) };
        table.make_active();
    }

    /// Reserve `page_count` pages at `base` backed directly by `frames`
    /// (e.g. an ELF segment's already-populated pages). Installs page
    /// table entries immediately.
    pub fn map_direct(
        &self,
        base: u64,
        frames: &[FrameNumber],
        flags: PageFlags,
    ) -> KernelResult<()> {
        let mut range = MappedRange::new(base, frames.len(), MappingKind::Direct, flags);
        for (i, &f) in frames.iter().enumerate() {
            range.frames[i] = Some(f);
            self.install_pte(base + (i as u64) * PAGE_SIZE, f, flags)?;
        }
        self.ranges.lock().push(range);
        Ok(())
    }

    /// Reserve `page_count` pages at `base` as demand-paged anonymous
    /// memory (e.g. heap growth via `brk`, or an `mmap(MAP_ANONYMOUS)`).
    /// No frames are allocated and no PTEs installed until a fault.
    pub fn map_anonymous(&self, base: u64, page_count: usize, flags: PageFlags) -> KernelResult<()> {
        self.ranges
            .lock()
            .push(MappedRange::new(base, page_count, MappingKind::Anonymous, flags));
        Ok(())
    }

    /// Remove the range starting at `base`, freeing any frames it had
    /// been backed by.
    pub fn unmap(&self, base: u64) -> KernelResult<()> {
        let mut ranges = self.ranges.lock();
        let idx = ranges
            .iter()
            .position(|r| r.base == base)
            .ok_or(KernelError::InvalidAddress { addr: base as usize })?;
        let range = ranges.remove(idx);
        for (i, frame) in range.frames.iter().enumerate() {
            if let Some(f) = frame {
                frame_allocator::free(*f);
                frame_allocator::set_owner(*f, None);
            }
            self.clear_pte(range.base + (i as u64) * PAGE_SIZE);
        }
        Ok(())
    }

    /// Resolve the physical frame currently backing `addr`, if any.
    pub fn get_physical_addr(&self, addr: u64) -> Option<PhysicalAddress> {
        let ranges = self.ranges.lock();
        let range = ranges.iter().find(|r| r.contains(addr))?;
        let idx = range.page_index(addr);
        range.frames[idx].map(|f| PhysicalAddress::new(f.addr()))
    }

    /// Handle a page fault at `addr`. For an `Anonymous` range with no
    /// frame yet, allocates and zeroes one and installs the PTE. Any
    /// other case (unmapped address, fault on a `Direct` range that's
    /// already backed, protection violation) is reported as an error for
    /// the caller to translate into `SIGSEGV`.
    pub fn handle_page_fault(&self, addr: u64, write: bool) -> KernelResult<()> {
        let page_base = addr & !(PAGE_SIZE - 1);
        let mut ranges = self.ranges.lock();
        let range = ranges
            .iter_mut()
            .find(|r| r.contains(page_base))
            .ok_or(KernelError::UnmappedMemory { addr: addr as usize })?;

        if write && (range.flags.0 & PageFlags::WRITABLE.0) == 0 {
            return Err(KernelError::PermissionDenied { operation: "write to read-only mapping" });
        }

        let idx = range.page_index(page_base);
        if range.frames[idx].is_some() {
            // Already backed; nothing to do (spurious fault, e.g. a
            // concurrent installer raced us).
            return Ok(());
        }
        if range.kind == MappingKind::Direct {
            return Err(KernelError::UnmappedMemory { addr: addr as usize });
        }

        let frame = frame_allocator::alloc().ok_or_else(|| frame_allocator::oom_error(PAGE_SIZE as usize))?;
        unsafe {
            frame_allocator::zero_frame(frame, hhdm_base());
        }
        frame_allocator::set_owner(frame, Some(page_base));
        range.frames[idx] = Some(frame);
        let flags = range.flags;
        drop(ranges);
        self.install_pte(page_base, frame, flags)?;
        Ok(())
    }

    /// Duplicate this address space for `fork`. Anonymous ranges get
    /// freshly allocated frames with their contents copied byte-for-byte
    /// (no copy-on-write); direct ranges are re-mapped onto the same
    /// physical frames, since they're typically read-only (e.g. loaded
    /// text segments) or owned by the caller to manage explicitly.
    pub fn fork(&self) -> KernelResult<Self> {
        let child = Self::new()?;
        let ranges = self.ranges.lock();
        for range in ranges.iter() {
            match range.kind {
                MappingKind::Direct => {
                    let frames: Vec<FrameNumber> = range
                        .frames
                        .iter()
                        .filter_map(|f| *f)
                        .collect();
                    child.map_direct(range.base, &frames, range.flags)?;
                }
                MappingKind::Anonymous => {
                    child.map_anonymous(range.base, range.page_count, range.flags)?;
                    for (i, src_frame) in range.frames.iter().enumerate() {
                        let Some(src_frame) = src_frame else { continue };
                        let dst_frame =
                            frame_allocator::alloc().ok_or_else(|| frame_allocator::oom_error(PAGE_SIZE as usize))?;
                        unsafe {
                            copy_frame(*src_frame, dst_frame);
                        }
                        frame_allocator::set_owner(dst_frame, Some(range.base + (i as u64) * PAGE_SIZE));
                        child.install_pte(range.base + (i as u64) * PAGE_SIZE, dst_frame, range.flags)?;
                        child.ranges.lock()[child_range_index(&child, range.base)].frames[i] = Some(dst_frame);
                    }
                }
            }
        }
        Ok(child)
    }

    fn install_pte(&self, vaddr: u64, frame: FrameNumber, flags: PageFlags) -> KernelResult<()> {
        let mut mapper = unsafe { super::page_table::PageMapper::new(self.l4_table_ptr()) };
        mapper
            .map_page(VirtualAddress::new(vaddr), frame, flags)
            .map_err(|_| KernelError::InvalidAddress { addr: vaddr as usize })
    }

    fn clear_pte(&self, vaddr: u64) {
        let mut mapper = unsafe { super::page_table::PageMapper::new(self.l4_table_ptr()) };
        let _ = mapper.unmap_page(VirtualAddress::new(vaddr));
    }

    fn l4_table_ptr(&self) -> *mut super::page_table::PageTable {
        (hhdm_base() + self.hierarchy.l4_addr().as_u64()) as *mut super::page_table::PageTable
    }
}

fn child_range_index(child: &Pagemap, base: u64) -> usize {
    child
        .ranges
        .lock()
        .iter()
        .position(|r| r.base == base)
        .expect("range just inserted")
}

/// Copy one frame's contents through the HHDM mapping.
///
/// # Safety
/// Both frames must be exclusively owned by the caller for the duration
/// of the copy.
unsafe fn copy_frame(src: FrameNumber, dst: FrameNumber) {
    let base = hhdm_base();
    let src_ptr = (base + src.addr()) as *const u8;
    let dst_ptr = (base + dst.addr()) as *mut u8;
    unsafe {
        core::ptr::copy_nonoverlapping(src_ptr, dst_ptr, super::frame_allocator::FRAME_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn anonymous_range_tracks_page_count() {
        frame_allocator::add_region(0x4000_0000, 64 * PAGE_SIZE);
        let pm = Pagemap::new().unwrap();
        pm.map_anonymous(0x1000_0000, 4, PageFlags::PRESENT | PageFlags::WRITABLE)
            .unwrap();
        assert!(pm.ranges.lock()[0].contains(0x1000_0000));
        assert!(!pm.ranges.lock()[0].contains(0x1000_0000 + 4 * PAGE_SIZE));
    }
}
