//! Boot handoff consumption (Limine protocol).
//!
//! Component O's boot handoff record — HHDM offset, typed memory map,
//! framebuffer descriptor, per-CPU `{processor_id, lapic_id,
//! extra_argument, goto_address}`, RSDP address, boot epoch — is the
//! Limine protocol's response structures, field for field. This module
//! reads those static responses and normalizes the memory map into the
//! plain region list the frame allocator consumes.

#![allow(dead_code)]

extern crate alloc;
use alloc::vec::Vec;

use limine::memory_map::EntryType;
use limine::request::{
    FramebufferRequest, HhdmRequest, MemoryMapRequest, MpRequest, RsdpRequest,
};

#[used]
#[link_section = ".requests"]
static MEMMAP_REQUEST: MemoryMapRequest = MemoryMapRequest::new();

#[used]
#[link_section = ".requests"]
static HHDM_REQUEST: HhdmRequest = HhdmRequest::new();

#[used]
#[link_section = ".requests"]
static FRAMEBUFFER_REQUEST: FramebufferRequest = FramebufferRequest::new();

#[used]
#[link_section = ".requests"]
static MP_REQUEST: MpRequest = MpRequest::new();

#[used]
#[link_section = ".requests"]
static RSDP_REQUEST: RsdpRequest = RsdpRequest::new();

/// One span of usable physical memory from the Limine memory map.
#[derive(Debug, Clone, Copy)]
pub struct UsableRegion {
    pub base: u64,
    pub len: u64,
}

/// A per-CPU startup descriptor from the Limine MP (SMP) response.
#[derive(Debug, Clone, Copy)]
pub struct CpuDescriptor {
    pub processor_id: u32,
    pub lapic_id: u32,
}

/// Everything early init needs out of the bootloader handoff, collected
/// into one value so [`super::init`] doesn't reach back into Limine's
/// response structures directly.
pub struct BootMemoryInfo {
    pub hhdm_offset: u64,
    pub usable_regions: Vec<UsableRegion>,
    pub rsdp_addr: Option<u64>,
    pub framebuffer_addr: Option<u64>,
    pub cpus: Vec<CpuDescriptor>,
}

/// Read the Limine responses and build the normalized boot info. Panics
/// if the bootloader didn't honor the HHDM or memory map requests — the
/// kernel cannot proceed without either.
pub fn collect() -> BootMemoryInfo {
    let hhdm = HHDM_REQUEST
        .get_response()
        .expect("bootloader did not answer HHDM request");
    let hhdm_offset = hhdm.offset();

    let memmap = MEMMAP_REQUEST
        .get_response()
        .expect("bootloader did not answer memory map request");

    let mut usable_regions = Vec::new();
    for entry in memmap.entries() {
        if entry.entry_type == EntryType::USABLE {
            usable_regions.push(UsableRegion {
                base: entry.base,
                len: entry.length,
            });
        }
    }

    let rsdp_addr = RSDP_REQUEST.get_response().map(|r| r.address() as u64);
    let framebuffer_addr = FRAMEBUFFER_REQUEST
        .get_response()
        .and_then(|r| r.framebuffers().next())
        .map(|fb| fb.addr() as u64);

    let mut cpus = Vec::new();
    if let Some(mp) = MP_REQUEST.get_response() {
        for cpu in mp.cpus() {
            cpus.push(CpuDescriptor {
                processor_id: cpu.id,
                lapic_id: cpu.lapic_id,
            });
        }
    }

    BootMemoryInfo {
        hhdm_offset,
        usable_regions,
        rsdp_addr,
        framebuffer_addr,
        cpus,
    }
}
