//! AArch64 (ARM64) architecture implementation.
//!
//! The switch is entered through a normal call, so only the AAPCS64
//! callee-saved state is kept: x19-x30, sp and (with `full-fpu`) d8-d15.
//! Interrupt masking goes through the DAIF I bit on bare metal.

use super::{Arch, ContextEntry};
use core::arch::global_asm;

pub struct Aarch64Arch;

#[repr(C)]
#[derive(Debug, Default)]
pub struct Aarch64Context {
    /// x19..=x28, x29 (frame pointer), x30 (link register)
    pub x: [u64; 12],
    pub sp: u64,

    #[cfg(feature = "full-fpu")]
    pub d: [u64; 8],
}

const LR: usize = 11;

macro_rules! switch_asm {
    (save: [$($save_fp:literal),*], restore: [$($restore_fp:literal),*]) => {
        global_asm!(
            ".text",
            ".p2align 4",
            concat!(".global ", asm_symbol!("tinythreads_aarch64_switch")),
            concat!(asm_symbol!("tinythreads_aarch64_switch"), ":"),
            // x0 = prev, x1 = next
            "mov x9, sp",
            "stp x19, x20, [x0, #0]",
            "stp x21, x22, [x0, #16]",
            "stp x23, x24, [x0, #32]",
            "stp x25, x26, [x0, #48]",
            "stp x27, x28, [x0, #64]",
            "stp x29, x30, [x0, #80]",
            "str x9, [x0, #96]",
            $($save_fp,)*
            "ldp x19, x20, [x1, #0]",
            "ldp x21, x22, [x1, #16]",
            "ldp x23, x24, [x1, #32]",
            "ldp x25, x26, [x1, #48]",
            "ldp x27, x28, [x1, #64]",
            "ldp x29, x30, [x1, #80]",
            "ldr x9, [x1, #96]",
            "mov sp, x9",
            $($restore_fp,)*
            "ret",
            "",
            ".p2align 4",
            concat!(".global ", asm_symbol!("tinythreads_aarch64_start")),
            concat!(asm_symbol!("tinythreads_aarch64_start"), ":"),
            // First resumption of a fresh context: x19 = arg, x20 = entry
            "mov x0, x19",
            "blr x20",
            "brk #0",
        );
    };
}

#[cfg(feature = "full-fpu")]
switch_asm!(
    save: [
        "stp d8, d9, [x0, #104]",
        "stp d10, d11, [x0, #120]",
        "stp d12, d13, [x0, #136]",
        "stp d14, d15, [x0, #152]"
    ],
    restore: [
        "ldp d8, d9, [x1, #104]",
        "ldp d10, d11, [x1, #120]",
        "ldp d12, d13, [x1, #136]",
        "ldp d14, d15, [x1, #152]"
    ]
);

#[cfg(not(feature = "full-fpu"))]
switch_asm!(save: [], restore: []);

extern "C" {
    fn tinythreads_aarch64_switch(prev: *mut Aarch64Context, next: *const Aarch64Context);
    fn tinythreads_aarch64_start();
}

impl Arch for Aarch64Arch {
    type SavedContext = Aarch64Context;

    unsafe fn init_context(
        ctx: &mut Self::SavedContext,
        stack_top: *mut u8,
        entry: ContextEntry,
        arg: usize,
    ) {
        let mut fresh = Aarch64Context::default();
        fresh.x[0] = arg as u64;
        fresh.x[1] = entry as usize as u64;
        fresh.x[LR] = tinythreads_aarch64_start as usize as u64;
        fresh.sp = (stack_top as usize as u64) & !0xF;
        *ctx = fresh;
    }

    unsafe fn switch_context(prev: *mut Self::SavedContext, next: *const Self::SavedContext) {
        unsafe { tinythreads_aarch64_switch(prev, next) }
    }

    #[cfg(target_os = "none")]
    fn enable_interrupts() {
        unsafe {
            core::arch::asm!(
                "msr daifclr, #2",
                options(nomem, nostack)
            );
        }
    }

    #[cfg(target_os = "none")]
    fn disable_interrupts() {
        unsafe {
            core::arch::asm!(
                "msr daifset, #2",
                options(nomem, nostack)
            );
        }
    }

    #[cfg(target_os = "none")]
    fn interrupts_enabled() -> bool {
        let daif: u64;
        unsafe {
            core::arch::asm!(
                "mrs {daif}, daif",
                daif = out(reg) daif,
                options(nostack, readonly)
            );
        }
        (daif & 0x80) == 0
    }

    #[cfg(not(target_os = "none"))]
    fn enable_interrupts() {
        super::hosted_irq::enable();
    }

    #[cfg(not(target_os = "none"))]
    fn disable_interrupts() {
        super::hosted_irq::disable();
    }

    #[cfg(not(target_os = "none"))]
    fn interrupts_enabled() -> bool {
        super::hosted_irq::enabled()
    }
}
