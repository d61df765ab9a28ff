//! Blocking mutex with FIFO hand-off.
//!
//! A [`Mutex`] guards no data of its own; it orders threads. Locking and
//! unlocking go through the [`Kernel`] because a contended lock parks the
//! running thread and dispatches another.

use crate::arch::Arch;
use crate::kernel::Kernel;
use crate::sched::Policy;
use crate::thread::Queue;

pub(crate) struct MutexState {
    pub(crate) locked: bool,
    pub(crate) wait_queue: Queue,
}

/// Kernel mutex.
///
/// Waiters are served in arrival order. On unlock with waiters, ownership
/// passes straight to the first waiter: it moves to the ready queue and the
/// mutex stays locked on its behalf.
///
/// A mutex is tied to the kernel whose threads use it; waiters are linked
/// through that kernel's pool.
pub struct Mutex {
    pub(crate) state: spin::Mutex<MutexState>,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            state: spin::Mutex::new(MutexState {
                locked: false,
                wait_queue: Queue::new(),
            }),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Whether some thread is parked on this mutex.
    pub fn has_waiters(&self) -> bool {
        !self.state.lock().wait_queue.is_empty()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Mutex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mutex")
            .field("locked", &state.locked)
            .field("waiting", &state.wait_queue.head())
            .finish()
    }
}

/// Ownership of a [`Mutex`] that ends when the guard is dropped.
#[must_use = "the mutex is unlocked as soon as the guard is dropped"]
pub struct LockGuard<'a, A: Arch, P: Policy> {
    pub(crate) kernel: &'a Kernel<A, P>,
    pub(crate) mutex: &'a Mutex,
}

impl<'a, A: Arch, P: Policy> Drop for LockGuard<'a, A, P> {
    fn drop(&mut self) {
        self.kernel.unlock(self.mutex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mutex_is_free() {
        static M: Mutex = Mutex::new();
        assert!(!M.is_locked());
        assert!(!M.has_waiters());
        assert_eq!(alloc::format!("{:?}", M), "Mutex { locked: false, waiting: None }");
    }
}
