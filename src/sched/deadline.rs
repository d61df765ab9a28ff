//! Priority-driven dispatch: rate-monotonic and earliest-deadline-first.
//!
//! Both compare strictly, so a tie never preempts the running thread.

use super::Policy;
use crate::thread::SchedParams;

/// Shorter period wins.
///
/// The idle context and one-shot threads have an unset period and lose to
/// any periodic thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateMonotonic;

impl Policy for RateMonotonic {
    fn preempts(&self, current: &SchedParams, head: &SchedParams) -> bool {
        head.period < current.period
    }

    fn name(&self) -> &'static str {
        "rate-monotonic"
    }
}

/// Earlier absolute deadline wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EarliestDeadlineFirst;

impl Policy for EarliestDeadlineFirst {
    fn preempts(&self, current: &SchedParams, head: &SchedParams) -> bool {
        head.deadline < current.deadline
    }

    fn name(&self) -> &'static str {
        "earliest-deadline-first"
    }
}
