//! Dispatch policies.
//!
//! A policy only answers one question on every scheduler pass: should the
//! running thread give the processor to the head of the ready queue? The
//! ready queue itself is always ordered by `(deadline, period)`, so all three
//! policies pick the same candidate and differ only in when they switch.

pub mod deadline;
pub mod policy;
pub mod rr;

pub use deadline::{EarliestDeadlineFirst, RateMonotonic};
pub use policy::{Policy, PolicyKind};
pub use rr::RoundRobin;

/// Default policy type.
pub type DefaultPolicy = EarliestDeadlineFirst;
