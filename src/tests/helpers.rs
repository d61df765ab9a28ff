//! Test helper utilities and common functionality.

use crate::arch::DefaultArch;
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::sched::Policy;
use crate::sync::Mutex;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Stacks for test threads; assertion formatting in a body needs room.
pub(crate) const TEST_STACK_SIZE: usize = 64 * 1024;

pub(crate) type TestKernel<P> = Kernel<DefaultArch, P>;

/// Build and initialize a kernel that lives for the rest of the test binary.
///
/// The calling test becomes the idle context.
pub(crate) fn kernel<P: Policy + 'static>(policy: P, threads: usize) -> &'static TestKernel<P> {
    let config = KernelConfig::new()
        .with_max_threads(threads)
        .with_stack_size(TEST_STACK_SIZE);
    let kernel = Box::leak(Box::new(Kernel::new(policy, config)));
    kernel.init().expect("kernel init failed");
    kernel
}

pub(crate) fn mutex() -> &'static Mutex {
    Box::leak(Box::new(Mutex::new()))
}

/// Shared record of what thread bodies observed.
///
/// Bodies only record; the idle context asserts. A failed assertion inside a
/// thread body cannot unwind out of the thread and would abort the binary.
pub(crate) struct Recorder<T>(Arc<spin::Mutex<Vec<T>>>);

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone> Recorder<T> {
    pub(crate) fn new() -> Self {
        Self(Arc::new(spin::Mutex::new(Vec::new())))
    }

    pub(crate) fn push(&self, value: T) {
        self.0.lock().push(value);
    }

    pub(crate) fn entries(&self) -> Vec<T> {
        self.0.lock().clone()
    }
}
