#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Single-core cooperative threading kernel with deadline-aware dispatch.
//!
//! `tinythreads` runs a fixed pool of threads on one core. Threads are
//! created from boxed bodies, switch voluntarily through
//! [`Kernel::yield_now`] or a contended [`Kernel::lock`], and are
//! re-evaluated on every timer tick by one of three dispatch policies:
//! round-robin, rate-monotonic, or earliest-deadline-first.
//!
//! # Target Platform
//!
//! - **Bare metal**: AArch64 (Raspberry Pi class boards), interrupts masked
//!   through DAIF
//! - **Hosted**: x86_64 under an operating system, used for tests and
//!   simulation; interrupt masking is emulated
//!
//! # Features
//!
//! - `full-fpu`: save the callee-saved FP registers in AArch64 contexts
//!   (default)
//!
//! # Quick Start
//!
//! ```ignore
//! use tinythreads::{EarliestDeadlineFirst, Kernel, KernelConfig};
//! use tinythreads::arch::DefaultArch;
//!
//! static KERNEL: Kernel<DefaultArch, EarliestDeadlineFirst> =
//!     Kernel::new(EarliestDeadlineFirst, KernelConfig::new());
//!
//! fn kernel_main() {
//!     KERNEL.init().expect("failed to initialize kernel");
//!
//!     KERNEL.spawn_with_deadline(|led| blink(led), 3, 100, 100)
//!         .expect("failed to spawn");
//!
//!     loop {
//!         // idle; the timer interrupt calls KERNEL.tick()
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`arch`]: context switching and interrupt masking behind the [`Arch`] trait
//! - [`thread`]: thread control blocks, the arena and its ordered queues
//! - [`sched`]: the dispatch policies
//! - [`kernel`]: spawn, yield, periodic re-activation and the tick entry point
//! - [`sync`]: the kernel mutex

pub mod arch;
pub mod config;
pub mod errors;
pub mod introspect;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests;

extern crate alloc;

// Panic handler for bare-metal
#[cfg(all(not(test), target_os = "none"))]
use core::panic::PanicInfo;

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    // On panic, disable interrupts and halt
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }
    loop {
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
        #[cfg(not(target_arch = "aarch64"))]
        core::hint::spin_loop();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{Arch, CriticalSection, DefaultArch};

// Configuration
pub use config::KernelConfig;

// Kernel
pub use kernel::Kernel;

// Scheduling policies
pub use sched::{DefaultPolicy, EarliestDeadlineFirst, Policy, PolicyKind, RateMonotonic, RoundRobin};

// Threads
pub use thread::{SchedParams, ThreadId};

// Synchronization
pub use sync::{LockGuard, Mutex};

// Time
pub use time::{TickCounter, Ticks, UNSET};

// Introspection
pub use introspect::{Snapshot, ThreadInfo};

// Errors
pub use errors::{InitError, SpawnError, ThreadError, ThreadResult};
