//! Memory barrier abstractions.
//!
//! Centralizes memory barrier operations so that non-arch code does not need
//! inline assembly or atomic fences scattered through it.
//!
//! # Barrier types
//!
//! * [`memory_fence`] -- full read/write fence (strongest).
//! * [`data_sync_barrier`] -- data synchronization barrier; equivalent to a
//!   full fence on x86_64.
//! * [`instruction_sync_barrier`] -- instruction stream synchronization; a
//!   no-op on x86_64 thanks to its strongly ordered memory model.

/// Full memory fence -- all reads and writes issued before this barrier are
/// globally visible before any reads or writes issued after it.
///
/// `core::sync::atomic::fence(SeqCst)` -- MFENCE semantics.
#[inline(always)]
pub fn memory_fence() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Data synchronization barrier with instruction synchronization.
///
/// Equivalent to [`memory_fence`] on x86_64, whose memory model already
/// guarantees the necessary ordering.
#[inline(always)]
pub fn data_sync_barrier() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Instruction synchronization barrier.
///
/// No-op on x86_64 -- its strongly ordered model and unified cache make an
/// explicit instruction barrier unnecessary.
#[inline(always)]
pub fn instruction_sync_barrier() {}
