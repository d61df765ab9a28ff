//! Memory management for thread stacks.

pub mod stack;

pub use stack::{Stack, STACK_ALIGN, STACK_CANARY};
