//! Fixed-size thread stacks.
//!
//! Every thread control block owns one [`Stack`] for the lifetime of the
//! kernel. Stacks are allocated once when the pool is built and are never
//! resized or moved, so the top address handed to a context stays valid.

extern crate alloc;

use alloc::alloc::{alloc, dealloc, Layout};
use core::ptr::NonNull;

/// Alignment of every stack buffer and of its top address.
pub const STACK_ALIGN: usize = 16;

/// Pattern written at the lowest word of each stack.
pub const STACK_CANARY: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// A heap-allocated stack buffer.
pub struct Stack {
    /// Pointer to the start of the stack memory (lowest address)
    memory: NonNull<u8>,
    /// Usable stack size in bytes
    size: usize,
}

impl Stack {
    /// Allocate a stack of `size` bytes.
    ///
    /// The size is rounded up to [`STACK_ALIGN`]. Returns `None` if the
    /// allocator fails or the size is too small to hold the canary.
    pub fn new(size: usize) -> Option<Self> {
        let size = size.checked_add(STACK_ALIGN - 1)? & !(STACK_ALIGN - 1);
        if size < 2 * STACK_ALIGN {
            return None;
        }

        let layout = Layout::from_size_align(size, STACK_ALIGN).ok()?;
        let memory = NonNull::new(unsafe { alloc(layout) })?;

        let stack = Self { memory, size };
        stack.install_canary();
        Some(stack)
    }

    /// Get the usable stack size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// One-past-the-end address of the buffer (stacks grow down from here).
    pub fn top(&self) -> *mut u8 {
        // Safety: `size` bytes were allocated at `memory`.
        unsafe { self.memory.as_ptr().add(self.size) }
    }

    /// Lowest address of the buffer.
    pub fn bottom(&self) -> *const u8 {
        self.memory.as_ptr()
    }

    /// Write [`STACK_CANARY`] at the lowest word of the stack.
    fn install_canary(&self) {
        let canary_location = self.memory.as_ptr() as *mut u64;
        unsafe {
            canary_location.write(STACK_CANARY);
        }
    }

    /// Check that the canary at the bottom of the stack is still intact.
    ///
    /// A corrupted canary means some thread ran past the end of this stack.
    pub fn canary_intact(&self) -> bool {
        let canary_location = self.memory.as_ptr() as *const u64;
        unsafe { canary_location.read_volatile() == STACK_CANARY }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        if let Ok(layout) = Layout::from_size_align(self.size, STACK_ALIGN) {
            unsafe {
                dealloc(self.memory.as_ptr(), layout);
            }
        }
    }
}

// Safety: the buffer is uniquely owned by this value.
unsafe impl Send for Stack {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_rounds_and_aligns() {
        let stack = Stack::new(1000).expect("allocation failed");
        assert_eq!(stack.size(), 1008);
        assert_eq!(stack.top() as usize % STACK_ALIGN, 0);
        assert_eq!(stack.top() as usize - stack.bottom() as usize, 1008);
    }

    #[test]
    fn test_stack_too_small() {
        assert!(Stack::new(0).is_none());
        assert!(Stack::new(8).is_none());
    }

    #[test]
    fn test_stack_canary() {
        let stack = Stack::new(4096).expect("allocation failed");
        assert!(stack.canary_intact());

        unsafe { (stack.bottom() as *mut u8).write(0) };
        assert!(!stack.canary_intact());
    }
}
