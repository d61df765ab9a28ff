//! Tick-based time for deadlines and periodic re-activation.
//!
//! The kernel never reads a hardware clock itself. Time is the value of a
//! [`TickCounter`] that the timer interrupt advances once per tick; absolute
//! deadlines and periods are expressed in those ticks.

pub mod tick;

pub use tick::TickCounter;

/// A point in time or an interval, measured in scheduler ticks.
pub type Ticks = u64;

/// Marker for "no deadline" / "no period".
///
/// It is the largest representable tick value, so threads without a deadline
/// sort after every thread that has one.
pub const UNSET: Ticks = Ticks::MAX;

/// Frequency in Hz of the scheduler tick on the reference board.
pub const TIMER_FREQUENCY_HZ: u32 = 1000; // 1 kHz = 1ms ticks

/// Busy-wait until `ticks` more ticks have elapsed on `counter`.
///
/// This only makes progress when something else advances the counter (the
/// timer interrupt on hardware, another thread in a simulation). It is meant
/// for task bodies, never for kernel code running inside a critical section.
pub fn spin_delay(counter: &TickCounter, ticks: Ticks) {
    let start = counter.ticks();
    while counter.elapsed_since(start) < ticks {
        core::hint::spin_loop();
    }
}
