//! Signal delivery (component G): ucontext trampoline and `sigreturn`.
//!
//! [`dispatch`] is called from the scheduler's tick-resume path
//! (`sched::scheduler::tick`) for whichever thread is about to run, if it
//! has a deliverable signal (pending and not blocked); this module holds
//! the per-signal action table lookups and the trampoline frame layout.
//! `sigreturn` undoes the redirect once the handler invokes
//! `Syscall::RtSigreturn`.

use super::pcb::Process;
use super::thread::Thread;

pub const SIG_DFL: u64 = 0;
pub const SIG_IGN: u64 = 1;

/// Record `signum` as pending for `thread` and wake it if blocked, so a
/// sleeping thread observes the signal promptly (e.g. interrupting a
/// blocking read with `EINTR`).
pub fn raise(process: &Process, thread: &Thread, signum: u32) {
    thread.signals.raise(signum);
    let _ = process;
    crate::sched::scheduler::wake(thread.tid());
}

pub fn set_action(process: &Process, signum: u32, handler: u64) {
    process.signal_actions.handlers.lock()[(signum - 1) as usize] = handler;
}

pub fn action_for(process: &Process, signum: u32) -> u64 {
    process.signal_actions.handlers.lock()[(signum - 1) as usize]
}

/// Saved user-mode register frame plus a pointer back to the interrupted
/// context, the way `sigreturn` finds its way back after the handler
/// runs.
#[repr(C)]
pub struct UContext {
    pub saved_rip: u64,
    pub saved_rsp: u64,
    pub saved_rflags: u64,
}

/// Build the trampoline frame for delivering `signum` to `thread`: push
/// a `UContext` onto the user stack, then redirect `rip` to the
/// registered handler so the thread "returns" into it, with [`sigreturn`]
/// restoring the original frame afterward.
pub fn dispatch(process: &Process, thread: &Thread, signum: u32) {
    let handler = action_for(process, signum);
    if handler == SIG_DFL || handler == SIG_IGN {
        thread.signals.clear(signum);
        return;
    }
    let mut ctx = thread.task.context.lock();
    let saved = UContext { saved_rip: ctx.rip, saved_rsp: ctx.rsp, saved_rflags: ctx.rflags };
    let new_sp = ctx.rsp - core::mem::size_of::<UContext>() as u64;
    unsafe {
        core::ptr::write(new_sp as *mut UContext, saved);
    }
    ctx.rsp = new_sp;
    ctx.rip = handler;
    thread.signals.clear(signum);
}

/// `rt_sigreturn`: undo [`dispatch`]'s redirect, restoring the register
/// frame it saved at the (then) top of the user stack.
pub fn sigreturn(thread: &Thread) {
    let mut ctx = thread.task.context.lock();
    // SAFETY: `dispatch` always leaves `ctx.rsp` pointing at the `UContext`
    // it pushed just before redirecting into the handler.
    let saved = unsafe { core::ptr::read(ctx.rsp as *const UContext) };
    ctx.rip = saved.saved_rip;
    ctx.rsp = saved.saved_rsp;
    ctx.rflags = saved.saved_rflags;
}
