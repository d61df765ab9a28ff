//! Error types of the kernel operations.
//!
//! Only conditions a caller can act on are errors. "No work to do" (an empty
//! ready queue, nothing due for re-activation) is ordinary control flow, and
//! corrupted kernel state is a panic.

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for kernel operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Any error reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// Pool construction errors
    Init(InitError),
    /// Thread creation errors
    Spawn(SpawnError),
}

/// Errors that can occur while building the thread pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// `init` was already called successfully
    AlreadyInitialized,
    /// A TCB or stack could not be allocated
    OutOfMemory,
    /// More threads requested than thread ids can name
    TooManyThreads(usize),
}

/// Errors that can occur during thread spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// The free queue is empty
    PoolExhausted,
    /// The pool could not be built on first use
    Init(InitError),
    /// A deadline of zero ticks
    InvalidDeadline,
    /// A period of zero ticks
    InvalidPeriod,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::Init(e) => write!(f, "Kernel init error: {}", e),
            ThreadError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::AlreadyInitialized => write!(f, "Kernel already initialized"),
            InitError::OutOfMemory => write!(f, "Out of memory for thread pool"),
            InitError::TooManyThreads(n) => write!(f, "Thread pool too large: {} threads", n),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::PoolExhausted => write!(f, "No free thread control block"),
            SpawnError::Init(e) => write!(f, "Thread pool unavailable: {}", e),
            SpawnError::InvalidDeadline => write!(f, "Deadline must be at least one tick"),
            SpawnError::InvalidPeriod => write!(f, "Period must be at least one tick"),
        }
    }
}

impl From<InitError> for ThreadError {
    fn from(error: InitError) -> Self {
        ThreadError::Init(error)
    }
}

impl From<SpawnError> for ThreadError {
    fn from(error: SpawnError) -> Self {
        ThreadError::Spawn(error)
    }
}

// A pool that cannot be built on first spawn surfaces as a spawn failure.
impl From<InitError> for SpawnError {
    fn from(error: InitError) -> Self {
        SpawnError::Init(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display_messages() {
        assert_eq!(SpawnError::PoolExhausted.to_string(), "No free thread control block");
        assert_eq!(
            ThreadError::from(InitError::TooManyThreads(70000)).to_string(),
            "Kernel init error: Thread pool too large: 70000 threads"
        );
    }

    #[test]
    fn test_question_mark_conversions() {
        fn spawn_like() -> ThreadResult<()> {
            Err(SpawnError::InvalidPeriod)?
        }
        fn init_during_spawn() -> Result<(), SpawnError> {
            Err(InitError::TooManyThreads(70000))?
        }

        assert_eq!(spawn_like(), Err(ThreadError::Spawn(SpawnError::InvalidPeriod)));
        assert_eq!(
            init_during_spawn(),
            Err(SpawnError::Init(InitError::TooManyThreads(70000)))
        );
    }
}
