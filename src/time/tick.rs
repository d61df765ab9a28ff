//! The kernel clock.

use super::Ticks;
use portable_atomic::{AtomicU64, Ordering};

/// Count of timer ticks since boot.
///
/// Deadlines are absolute values of this counter and periods are distances
/// on it. Only the timer path should advance it; everybody may read it.
pub struct TickCounter {
    ticks: AtomicU64,
    frequency: u32,
    ns_per_tick: u64,
}

impl TickCounter {
    /// A counter at zero that advances `frequency` times per second.
    ///
    /// A frequency of zero is taken as 1 Hz. Above 1 GHz a tick still
    /// counts as one nanosecond.
    pub const fn new(frequency: u32) -> Self {
        let frequency = if frequency == 0 { 1 } else { frequency };
        let ns_per_tick = 1_000_000_000 / frequency as u64;
        Self {
            ticks: AtomicU64::new(0),
            frequency,
            ns_per_tick: if ns_per_tick == 0 { 1 } else { ns_per_tick },
        }
    }

    /// Count one tick and return the new value.
    pub fn increment(&self) -> Ticks {
        self.advance(1)
    }

    /// Count `n` ticks at once (a timer that coalesced interrupts, or a
    /// simulation skipping ahead) and return the new value.
    ///
    /// Periodic threads are only re-admitted on the exact tick of their
    /// deadline, so skipping past one leaves that thread parked.
    pub fn advance(&self, n: Ticks) -> Ticks {
        self.ticks.fetch_add(n, Ordering::AcqRel).wrapping_add(n)
    }

    pub fn ticks(&self) -> Ticks {
        self.ticks.load(Ordering::Acquire)
    }

    /// Ticks counted since `start`, tolerant of wrap-around.
    pub fn elapsed_since(&self, start: Ticks) -> Ticks {
        self.ticks().wrapping_sub(start)
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn ticks_to_nanos(&self, ticks: Ticks) -> u64 {
        ticks.saturating_mul(self.ns_per_tick)
    }

    /// Round down to whole ticks.
    pub fn nanos_to_ticks(&self, nanos: u64) -> Ticks {
        nanos / self.ns_per_tick
    }
}
