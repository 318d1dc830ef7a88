//! Architecture-independent timer interface

/// Get current timer tick count
pub fn get_ticks() -> u64 {
    crate::arch::x86_64::timer::get_ticks()
}
