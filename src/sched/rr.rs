//! Round-robin dispatch.

use super::Policy;
use crate::thread::SchedParams;

/// Yield to the ready head on every scheduler pass.
///
/// The running thread re-enters the ready queue behind every thread with an
/// equal or earlier key, so threads without deadlines take turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundRobin;

impl Policy for RoundRobin {
    fn preempts(&self, _current: &SchedParams, _head: &SchedParams) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
