//! ACPI table discovery for x86_64, via the `acpi` crate.
//!
//! Parses the MADT (CPU/local-APIC/I-O-APIC/interrupt-source-override
//! topology) and locates the HPET, per SPEC_FULL.md §4.O. Full AML
//! interpretation and the ACPI namespace are out of scope.

extern crate alloc;
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use acpi::platform::interrupt::{InterruptSourceOverride, IoApic, Polarity, TriggerMode};
use acpi::platform::ProcessorState;
use acpi::{AcpiHandler, AcpiTables, HpetInfo, InterruptModel, PhysicalMapping};
use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::mm::{phys_to_virt, PhysicalAddress};

/// A CPU's local APIC entry, from the MADT's processor list.
#[derive(Debug, Clone, Copy)]
pub struct MadtLocalApic {
    pub acpi_processor_id: u32,
    pub apic_id: u32,
    pub is_usable: bool,
}

/// An I/O APIC entry from the MADT.
#[derive(Debug, Clone, Copy)]
pub struct MadtIoApic {
    pub id: u8,
    pub address: u32,
    pub gsi_base: u32,
}

/// An ISA IRQ -> GSI override from the MADT.
#[derive(Debug, Clone, Copy)]
pub struct MadtIso {
    pub irq_source: u8,
    pub gsi: u32,
    pub active_low: bool,
    pub level_triggered: bool,
}

/// Digested ACPI information, populated by [`init`] from the `acpi`
/// crate's parsed tables.
#[derive(Debug, Default)]
pub struct AcpiInfo {
    pub local_apic_address: u64,
    pub has_legacy_pics: bool,
    pub local_apics: Vec<MadtLocalApic>,
    pub io_apics: Vec<MadtIoApic>,
    pub isos: Vec<MadtIso>,
    pub hpet_base_address: Option<u64>,
}

impl AcpiInfo {
    /// The first I/O APIC's MMIO base, or the legacy default.
    pub fn io_apic_address(&self) -> u32 {
        self.io_apics.first().map_or(0xFEC0_0000, |a| a.address)
    }

    /// Resolve an ISA IRQ to its GSI, applying any MADT override.
    /// Returns `(gsi, active_low, level_triggered)`.
    pub fn irq_to_gsi(&self, irq: u8) -> (u32, bool, bool) {
        self.isos
            .iter()
            .find(|iso| iso.irq_source == irq)
            .map(|iso| (iso.gsi, iso.active_low, iso.level_triggered))
            .unwrap_or((irq as u32, false, false))
    }

    pub fn cpu_count(&self) -> usize {
        self.local_apics.iter().filter(|l| l.is_usable).count()
    }
}

static ACPI_INITIALIZED: AtomicBool = AtomicBool::new(false);
static ACPI_INFO: Mutex<Option<AcpiInfo>> = Mutex::new(None);

pub fn is_initialized() -> bool {
    ACPI_INITIALIZED.load(Ordering::Acquire)
}

/// Access the parsed ACPI info, if [`init`] has succeeded.
pub fn with_acpi_info<R, F: FnOnce(&AcpiInfo) -> R>(f: F) -> Option<R> {
    ACPI_INFO.lock().as_ref().map(f)
}

/// Maps physical ACPI tables through the HHDM, the way the rest of the
/// kernel's physical-memory access works (`mm::phys_to_virt`).
#[derive(Clone)]
struct KernelAcpiHandler;

impl AcpiHandler for KernelAcpiHandler {
    unsafe fn map_physical_region<T>(
        &self,
        physical_address: usize,
        size: usize,
    ) -> PhysicalMapping<Self, T> {
        let virt = phys_to_virt(PhysicalAddress::new(physical_address as u64)).as_u64();
        // SAFETY: the HHDM maps all usable physical memory read/write for
        // the kernel's lifetime; `virt` is never null.
        let ptr = NonNull::new(virt as *mut T).expect("HHDM mapping returned a null pointer");
        PhysicalMapping::new(physical_address, ptr, size, size, self.clone())
    }

    fn unmap_physical_region<T>(_region: &PhysicalMapping<Self, T>) {
        // The HHDM mapping is permanent; nothing to tear down.
    }
}

/// Parse ACPI tables starting from `rsdp_phys_addr` (the Limine `RSDP_REQUEST`
/// response). Must run after `mm::init` has established the HHDM.
pub fn init(rsdp_phys_addr: Option<u64>) -> KernelResult<()> {
    if ACPI_INITIALIZED.load(Ordering::Acquire) {
        return Err(KernelError::AlreadyExists { resource: "ACPI", id: 0 });
    }

    let Some(rsdp_phys) = rsdp_phys_addr else {
        log::warn!("acpi: no RSDP address from bootloader, ACPI unavailable");
        return Err(KernelError::NotInitialized { subsystem: "ACPI (no RSDP)" });
    };

    // SAFETY: `rsdp_phys` is the address the bootloader reported for the
    // RSDP; `KernelAcpiHandler` maps it (and everything `acpi` subsequently
    // walks) through the HHDM.
    let tables = unsafe { AcpiTables::from_rsdp(KernelAcpiHandler, rsdp_phys as usize) }
        .map_err(|_| KernelError::InvalidArgument { name: "RSDP", value: "rejected by acpi crate" })?;

    let mut info = AcpiInfo::default();

    if let Ok(platform_info) = tables.platform_info() {
        if let InterruptModel::Apic(apic) = platform_info.interrupt_model {
            info.local_apic_address = apic.local_apic_address;
            info.has_legacy_pics = apic.also_has_legacy_pics;
            info.io_apics = apic.io_apics.iter().map(io_apic_entry).collect();
            info.isos = apic.interrupt_source_overrides.iter().map(iso_entry).collect();
        }

        if let Some(processor_info) = platform_info.processor_info {
            info.local_apics.push(processor_entry(
                processor_info.boot_processor.processor_uid,
                processor_info.boot_processor.local_apic_id,
                processor_info.boot_processor.state,
            ));
            for ap in processor_info.application_processors.iter() {
                info.local_apics.push(processor_entry(ap.processor_uid, ap.local_apic_id, ap.state));
            }
        }
    }

    if let Ok(hpet) = HpetInfo::new(&tables) {
        info.hpet_base_address = Some(hpet.base_address as u64);
    }

    if info.local_apics.is_empty() {
        log::warn!("acpi: no MADT processor entries, assuming a single usable CPU");
        info.local_apics.push(MadtLocalApic { acpi_processor_id: 0, apic_id: 0, is_usable: true });
    }

    log::info!(
        "acpi: {} usable CPU(s), {} I/O APIC(s), HPET {}",
        info.cpu_count(),
        info.io_apics.len(),
        if info.hpet_base_address.is_some() { "present" } else { "absent" }
    );

    *ACPI_INFO.lock() = Some(info);
    ACPI_INITIALIZED.store(true, Ordering::Release);
    Ok(())
}

fn io_apic_entry(io_apic: &IoApic) -> MadtIoApic {
    MadtIoApic { id: io_apic.id, address: io_apic.address, gsi_base: io_apic.global_system_interrupt_base }
}

fn iso_entry(iso: &InterruptSourceOverride) -> MadtIso {
    MadtIso {
        irq_source: iso.isa_source,
        gsi: iso.global_system_interrupt,
        active_low: matches!(iso.polarity, Polarity::ActiveLow),
        level_triggered: matches!(iso.trigger_mode, TriggerMode::Level),
    }
}

fn processor_entry(uid: u32, lapic_id: u32, state: ProcessorState) -> MadtLocalApic {
    MadtLocalApic {
        acpi_processor_id: uid,
        apic_id: lapic_id,
        is_usable: !matches!(state, ProcessorState::Disabled),
    }
}

/// Dump parsed ACPI information to the log (for the `acpi` shell command).
pub fn dump() {
    let guard = ACPI_INFO.lock();
    let Some(info) = guard.as_ref() else {
        log::info!("acpi: not initialized");
        return;
    };

    log::info!("=== ACPI Information ===");
    log::info!("local APIC address: {:#x} (legacy PICs: {})", info.local_apic_address, info.has_legacy_pics);

    log::info!("--- CPUs ({}) ---", info.local_apics.len());
    for lapic in &info.local_apics {
        log::info!(
            "  CPU: apic_id={}, proc_id={} {}",
            lapic.apic_id,
            lapic.acpi_processor_id,
            if lapic.is_usable { "[usable]" } else { "[disabled]" }
        );
    }

    log::info!("--- I/O APICs ({}) ---", info.io_apics.len());
    for io_apic in &info.io_apics {
        log::info!("  I/O APIC {}: addr={:#x}, gsi_base={}", io_apic.id, io_apic.address, io_apic.gsi_base);
    }

    if !info.isos.is_empty() {
        log::info!("--- Interrupt Source Overrides ({}) ---", info.isos.len());
        for iso in &info.isos {
            log::info!(
                "  IRQ {} -> GSI {} (active_low={}, level={})",
                iso.irq_source, iso.gsi, iso.active_low, iso.level_triggered
            );
        }
    }

    match info.hpet_base_address {
        Some(base) => log::info!("HPET base: {base:#x}"),
        None => log::info!("HPET: not present"),
    }
}
