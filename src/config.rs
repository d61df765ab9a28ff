//! Kernel configuration.

/// Default number of thread control blocks in the pool.
pub const DEFAULT_MAX_THREADS: usize = 5;

/// Default stack size per thread in bytes.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Static sizing of a [`Kernel`](crate::Kernel).
///
/// Both values are fixed once the pool is built; nothing is allocated after
/// that.
///
/// ```
/// use tinythreads::KernelConfig;
///
/// const CONFIG: KernelConfig = KernelConfig::new()
///     .with_max_threads(8)
///     .with_stack_size(4096);
/// assert_eq!(CONFIG.max_threads, 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Capacity of the thread pool
    pub max_threads: usize,
    /// Bytes of stack owned by each thread
    pub stack_size: usize,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub const fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
