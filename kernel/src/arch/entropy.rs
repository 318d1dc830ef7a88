//! Hardware timestamp counter.
//!
//! Centralizes the RDTSC read so that bench/test timing code doesn't embed
//! inline assembly directly.

/// Read the hardware timestamp/cycle counter (`RDTSC`).
#[inline]
pub fn read_timestamp() -> u64 {
    // SAFETY: _rdtsc reads the Time Stamp Counter register. It is always
    // available on x86_64 and returns the current cycle count as u64.
    unsafe { core::arch::x86_64::_rdtsc() }
}
