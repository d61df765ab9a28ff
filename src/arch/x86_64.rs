//! x86_64 context switching.
//!
//! Used mainly to run the kernel as an ordinary process (tests and
//! simulation). Only the System V callee-saved registers are kept in the
//! context: the switch is entered through a normal function call, so the
//! compiler has already spilled everything else.

use super::{Arch, ContextEntry};
use core::arch::global_asm;

/// Saved thread context for x86_64.
#[repr(C)]
#[derive(Debug, Default)]
pub struct X86_64Context {
    pub rsp: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

global_asm!(
    ".text",
    ".p2align 4",
    concat!(".global ", asm_symbol!("tinythreads_x86_64_switch")),
    concat!(asm_symbol!("tinythreads_x86_64_switch"), ":"),
    // rdi = prev, rsi = next
    "mov [rdi + 0x00], rsp",
    "mov [rdi + 0x08], rbp",
    "mov [rdi + 0x10], rbx",
    "mov [rdi + 0x18], r12",
    "mov [rdi + 0x20], r13",
    "mov [rdi + 0x28], r14",
    "mov [rdi + 0x30], r15",
    "mov rsp, [rsi + 0x00]",
    "mov rbp, [rsi + 0x08]",
    "mov rbx, [rsi + 0x10]",
    "mov r12, [rsi + 0x18]",
    "mov r13, [rsi + 0x20]",
    "mov r14, [rsi + 0x28]",
    "mov r15, [rsi + 0x30]",
    "ret",
    "",
    ".p2align 4",
    concat!(".global ", asm_symbol!("tinythreads_x86_64_start")),
    concat!(asm_symbol!("tinythreads_x86_64_start"), ":"),
    // First resumption of a fresh context: r12 = arg, r13 = entry
    "mov rdi, r12",
    "and rsp, -16",
    "call r13",
    "ud2",
);

extern "C" {
    fn tinythreads_x86_64_switch(prev: *mut X86_64Context, next: *const X86_64Context);
    fn tinythreads_x86_64_start();
}

/// x86_64 architecture implementation.
pub struct X86_64Arch;

impl Arch for X86_64Arch {
    type SavedContext = X86_64Context;

    unsafe fn init_context(
        ctx: &mut Self::SavedContext,
        stack_top: *mut u8,
        entry: ContextEntry,
        arg: usize,
    ) {
        let top = (stack_top as usize) & !0xF;
        // The switch `ret`s into the start shim, so its address sits where
        // a return address would.
        let sp = (top - 16) as *mut u64;
        unsafe {
            sp.write(tinythreads_x86_64_start as usize as u64);
            sp.add(1).write(0);
        }

        *ctx = X86_64Context {
            rsp: sp as u64,
            r12: arg as u64,
            r13: entry as usize as u64,
            ..X86_64Context::default()
        };
    }

    unsafe fn switch_context(prev: *mut Self::SavedContext, next: *const Self::SavedContext) {
        unsafe { tinythreads_x86_64_switch(prev, next) }
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

    #[cfg(target_os = "none")]
    fn enable_interrupts() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) }
    }

    #[cfg(target_os = "none")]
    fn disable_interrupts() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
    }

    #[cfg(target_os = "none")]
    fn interrupts_enabled() -> bool {
        let rflags: u64;
        unsafe {
            core::arch::asm!("pushfq", "pop {}", out(reg) rflags, options(preserves_flags));
        }
        rflags & (1 << 9) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::ptr;
    use portable_atomic::{AtomicUsize, Ordering};

    static mut MAIN_CTX: X86_64Context = X86_64Context {
        rsp: 0,
        rbp: 0,
        rbx: 0,
        r12: 0,
        r13: 0,
        r14: 0,
        r15: 0,
    };
    static mut SIDE_CTX: X86_64Context = X86_64Context {
        rsp: 0,
        rbp: 0,
        rbx: 0,
        r12: 0,
        r13: 0,
        r14: 0,
        r15: 0,
    };
    static SEEN: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn side_entry(arg: usize) -> ! {
        unsafe {
            SEEN.store(arg, Ordering::SeqCst);
            X86_64Arch::switch_context(ptr::addr_of_mut!(SIDE_CTX), ptr::addr_of!(MAIN_CTX));
        }
        unreachable!("side context resumed after finishing");
    }

    #[test]
    fn test_init_context_layout() {
        let mut stack = vec![0u8; 4096];
        let top = unsafe { stack.as_mut_ptr().add(stack.len()) };
        let mut ctx = X86_64Context::default();
        unsafe { X86_64Arch::init_context(&mut ctx, top, side_entry, 7) };

        assert_eq!(ctx.rsp % 16, 0);
        assert!(ctx.rsp < top as u64);
        assert_eq!(ctx.r12, 7);
        assert_eq!(ctx.r13, side_entry as usize as u64);
    }

    #[test]
    fn test_switch_round_trip() {
        let mut stack = vec![0u8; 16 * 1024];
        let top = unsafe { stack.as_mut_ptr().add(stack.len()) };
        unsafe {
            X86_64Arch::init_context(&mut *ptr::addr_of_mut!(SIDE_CTX), top, side_entry, 0xC0FFEE);
            X86_64Arch::switch_context(ptr::addr_of_mut!(MAIN_CTX), ptr::addr_of!(SIDE_CTX));
        }
        assert_eq!(SEEN.load(Ordering::SeqCst), 0xC0FFEE);
    }
}
