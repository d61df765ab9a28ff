//! Architecture abstraction layer for context switching and interrupt masking.
//!
//! This module is the only place that knows how a thread's execution state
//! is saved and restored. Everything above it handles threads through
//! [`ThreadId`](crate::thread::ThreadId)s and the kernel operations.

pub mod critical;

pub use critical::CriticalSection;

/// Entry point of a freshly initialized context.
///
/// It receives the word passed to [`Arch::init_context`] and must never
/// return: a thread leaves its stack only by switching to another context.
pub type ContextEntry = extern "C" fn(usize) -> !;

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations of this trait involve direct register manipulation and
/// assembly. All methods marked as unsafe have specific preconditions that
/// must be upheld by the caller.
pub trait Arch {
    /// Architecture-specific saved context type.
    ///
    /// This type holds every register that must survive a call to
    /// [`Arch::switch_context`], including the stack pointer.
    type SavedContext: Send + Default;

    /// Prepare `ctx` so that the first switch into it runs `entry(arg)` on
    /// the stack ending at `stack_top`.
    ///
    /// # Safety
    ///
    /// - `stack_top` must be the one-past-the-end address of a writable
    ///   stack buffer, aligned to 16 bytes, that stays valid for as long as
    ///   the context can be resumed
    /// - The buffer must not be in use by any running or suspended context
    unsafe fn init_context(
        ctx: &mut Self::SavedContext,
        stack_top: *mut u8,
        entry: ContextEntry,
        arg: usize,
    );

    /// Save the running context into `prev` and resume `next`.
    ///
    /// Returns when some other context later switches back into `prev`.
    ///
    /// # Safety
    ///
    /// - `prev` must point to a valid, properly aligned SavedContext
    /// - `next` must point to a SavedContext that was filled by an earlier
    ///   switch or by [`Arch::init_context`]
    /// - Both pointers must stay valid until the switch has completed
    /// - Must be called with interrupts disabled
    unsafe fn switch_context(prev: *mut Self::SavedContext, next: *const Self::SavedContext);

    /// Enable interrupts on the current CPU.
    fn enable_interrupts();

    /// Disable interrupts on the current CPU.
    fn disable_interrupts();

    /// Check if interrupts are currently enabled.
    fn interrupts_enabled() -> bool;
}

/// Interrupt mask emulation for hosted builds.
///
/// User space cannot mask interrupts, and the hosted kernel never receives
/// real ones, so the flag only records what the kernel asked for.
#[cfg(not(target_os = "none"))]
mod hosted_irq {
    use portable_atomic::{AtomicBool, Ordering};

    static INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);

    pub(super) fn enable() {
        INTERRUPTS_ENABLED.store(true, Ordering::Release);
    }

    pub(super) fn disable() {
        INTERRUPTS_ENABLED.store(false, Ordering::Release);
    }

    pub(super) fn enabled() -> bool {
        INTERRUPTS_ENABLED.load(Ordering::Acquire)
    }
}

// Assembly symbols carry a leading underscore on Mach-O targets.
#[cfg(target_vendor = "apple")]
macro_rules! asm_symbol {
    ($name:literal) => {
        concat!("_", $name)
    };
}

#[cfg(not(target_vendor = "apple"))]
macro_rules! asm_symbol {
    ($name:literal) => {
        $name
    };
}

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Arch as DefaultArch;

#[cfg(target_arch = "x86_64")]
pub use x86_64::X86_64Arch as DefaultArch;

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
compile_error!("tinythreads supports aarch64 (bare metal or hosted) and hosted x86_64 only.");
