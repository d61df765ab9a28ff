//! Synchronization between kernel threads.

pub mod mutex;

pub use mutex::{LockGuard, Mutex};
