//! Interrupt-masked critical sections.

use super::Arch;
use core::marker::PhantomData;

/// Scoped interrupt mask.
///
/// Creating the guard disables interrupts; dropping it restores the state
/// that was in effect before, so sections nest and every early return
/// re-enables interrupts exactly when the outermost section ends.
///
/// A guard may be held across a context switch. The thread that resumes
/// drops its own guard (or, for a fresh thread, the trampoline enables
/// interrupts), which is what ends the section on the new stack.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct CriticalSection<A: Arch> {
    was_enabled: bool,
    _arch: PhantomData<A>,
    // Interrupt state belongs to the core the guard was taken on.
    _not_send: PhantomData<*const ()>,
}

impl<A: Arch> CriticalSection<A> {
    /// Disable interrupts until the returned guard is dropped.
    #[inline]
    pub fn enter() -> Self {
        let was_enabled = A::interrupts_enabled();
        A::disable_interrupts();
        Self {
            was_enabled,
            _arch: PhantomData,
            _not_send: PhantomData,
        }
    }

    /// Whether interrupts were enabled when this section was entered.
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<A: Arch> Drop for CriticalSection<A> {
    #[inline]
    fn drop(&mut self) {
        if self.was_enabled {
            A::enable_interrupts();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::arch::ContextEntry;
    use core::cell::Cell;

    std::thread_local! {
        static ENABLED: Cell<bool> = const { Cell::new(true) };
    }

    /// Interrupt mask that is private to the test thread; never switches.
    pub(crate) struct MaskOnlyArch;

    impl Arch for MaskOnlyArch {
        type SavedContext = ();

        unsafe fn init_context(_: &mut (), _: *mut u8, _: ContextEntry, _: usize) {}

        unsafe fn switch_context(_: *mut (), _: *const ()) {}

        fn enable_interrupts() {
            ENABLED.with(|e| e.set(true));
        }

        fn disable_interrupts() {
            ENABLED.with(|e| e.set(false));
        }

        fn interrupts_enabled() -> bool {
            ENABLED.with(|e| e.get())
        }
    }

    #[test]
    fn test_section_masks_and_restores() {
        assert!(MaskOnlyArch::interrupts_enabled());
        {
            let cs = CriticalSection::<MaskOnlyArch>::enter();
            assert!(cs.was_enabled());
            assert!(!MaskOnlyArch::interrupts_enabled());
        }
        assert!(MaskOnlyArch::interrupts_enabled());
    }

    #[test]
    fn test_nested_sections_restore_outermost_state() {
        let outer = CriticalSection::<MaskOnlyArch>::enter();
        {
            let inner = CriticalSection::<MaskOnlyArch>::enter();
            assert!(!inner.was_enabled());
        }
        assert!(!MaskOnlyArch::interrupts_enabled());
        drop(outer);
        assert!(MaskOnlyArch::interrupts_enabled());
    }

    #[test]
    fn test_early_return_releases_section() {
        fn bail(flag: bool) -> Option<u32> {
            let _cs = CriticalSection::<MaskOnlyArch>::enter();
            if flag {
                return None;
            }
            Some(1)
        }

        assert_eq!(bail(true), None);
        assert!(MaskOnlyArch::interrupts_enabled());
        assert_eq!(bail(false), Some(1));
        assert!(MaskOnlyArch::interrupts_enabled());
    }
}
