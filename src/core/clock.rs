//! Simulation Clock
//!
//! Monotonic time source used for round duration math only.
//! Timestamps are seconds since the clock's own origin, never wall time.

use std::time::Instant;

/// Seconds on a monotonic clock.
pub type Seconds = f64;

/// Monotonic time source.
pub trait Clock {
    /// Current timestamp. Never decreases between calls.
    fn now(&self) -> Seconds;
}

/// Real-time clock backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Seconds {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock for tests and headless simulation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualClock {
    now: Seconds,
}

impl ManualClock {
    /// Create a clock at the given timestamp.
    pub fn starting_at(now: Seconds) -> Self {
        Self { now }
    }

    /// Move time forward. Negative or non-finite steps are ignored.
    pub fn advance(&mut self, delta: Seconds) {
        if delta.is_finite() && delta > 0.0 {
            self.now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Seconds {
        self.now
    }
}
