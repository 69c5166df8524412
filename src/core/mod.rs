//! Simulation primitives.
//!
//! Time, timers and randomness consumed by the round scheduler. Nothing
//! here knows about minigames or entities.

pub mod clock;
pub mod timer;
pub mod rng;

// Re-export core types
pub use clock::{Clock, ManualClock, MonotonicClock, Seconds};
pub use timer::{Timer, TimerHandle, TimerQueue};
pub use rng::DeterministicRng;
