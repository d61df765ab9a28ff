//! The policy trait and runtime policy selection.

use super::{EarliestDeadlineFirst, RateMonotonic, RoundRobin};
use crate::thread::SchedParams;

/// Preemption rule applied by [`Kernel::scheduler`](crate::Kernel::scheduler).
///
/// Implementations must be pure: the kernel calls them inside a critical
/// section with the kernel state locked.
pub trait Policy: Send + Sync {
    /// Whether the running thread should yield to the ready head.
    ///
    /// # Arguments
    ///
    /// * `current` - Parameters of the running thread; the idle context has
    ///   [`SchedParams::NONE`]
    /// * `head` - Parameters of the head of the ready queue
    fn preempts(&self, current: &SchedParams, head: &SchedParams) -> bool;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Policy chosen from a runtime value, such as a boot parameter.
///
/// ```
/// use tinythreads::{PolicyKind, Policy};
///
/// let kind: PolicyKind = "rm".parse().unwrap();
/// assert_eq!(kind, PolicyKind::RateMonotonic);
/// assert_eq!(kind.name(), "rate-monotonic");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    RoundRobin,
    RateMonotonic,
    #[default]
    EarliestDeadlineFirst,
}

impl Policy for PolicyKind {
    fn preempts(&self, current: &SchedParams, head: &SchedParams) -> bool {
        match self {
            PolicyKind::RoundRobin => RoundRobin.preempts(current, head),
            PolicyKind::RateMonotonic => RateMonotonic.preempts(current, head),
            PolicyKind::EarliestDeadlineFirst => EarliestDeadlineFirst.preempts(current, head),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PolicyKind::RoundRobin => RoundRobin.name(),
            PolicyKind::RateMonotonic => RateMonotonic.name(),
            PolicyKind::EarliestDeadlineFirst => EarliestDeadlineFirst.name(),
        }
    }
}

/// The name did not match any policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownPolicy;

impl core::fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Unknown scheduling policy")
    }
}

impl core::str::FromStr for PolicyKind {
    type Err = UnknownPolicy;

    /// Accepts the short (`rr`, `rm`, `edf`) and long names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" | "round-robin" => Ok(PolicyKind::RoundRobin),
            "rm" | "rate-monotonic" => Ok(PolicyKind::RateMonotonic),
            "edf" | "earliest-deadline-first" => Ok(PolicyKind::EarliestDeadlineFirst),
            _ => Err(UnknownPolicy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_delegates_to_policy() {
        let current = SchedParams::new(100, 10);
        let head = SchedParams::new(50, 20);

        assert!(PolicyKind::RoundRobin.preempts(&current, &head));
        assert!(!PolicyKind::RateMonotonic.preempts(&current, &head));
        assert!(PolicyKind::EarliestDeadlineFirst.preempts(&current, &head));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("edf".parse(), Ok(PolicyKind::EarliestDeadlineFirst));
        assert_eq!("round-robin".parse(), Ok(PolicyKind::RoundRobin));
        assert_eq!("fifo".parse::<PolicyKind>(), Err(UnknownPolicy));
        assert_eq!(PolicyKind::default(), PolicyKind::EarliestDeadlineFirst);
    }
}
