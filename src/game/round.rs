//! Round Timing
//!
//! The current round as a value: which minigame, when it started, when it
//! ends. Only the scheduler mutates it.

use serde::{Serialize, Deserialize};

use crate::core::clock::Seconds;
use crate::core::rng::DeterministicRng;
use crate::game::minigame::MinigameId;

/// Default shortest round (seconds).
pub const DEFAULT_MIN_DURATION: Seconds = 20.0;

/// Default longest round (seconds).
pub const DEFAULT_MAX_DURATION: Seconds = 30.0;

/// Closed range round durations are drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DurationRange {
    /// Shortest round (seconds, > 0)
    pub min: Seconds,
    /// Longest round (seconds, >= min)
    pub max: Seconds,
}

impl Default for DurationRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_DURATION,
            max: DEFAULT_MAX_DURATION,
        }
    }
}

impl DurationRange {
    /// Create a range. Validation happens at config load.
    pub const fn new(min: Seconds, max: Seconds) -> Self {
        Self { min, max }
    }

    /// Whether `0 < min <= max` and both are finite.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }

    /// Draw a duration uniformly from `[min, max]`.
    pub fn sample(&self, rng: &mut DeterministicRng) -> Seconds {
        rng.next_seconds_range(self.min, self.max)
    }

    /// Whether `d` lies in the range.
    pub fn contains(&self, d: Seconds) -> bool {
        d >= self.min && d <= self.max
    }
}

/// The current round.
///
/// `minigame == None` means no round is active and both timestamps are
/// meaningless; `time_remaining` reports zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[derive(Default)]
pub struct Round {
    /// Monotonic round counter (0 before the first round)
    pub number: u64,
    /// Active minigame
    pub minigame: MinigameId,
    /// When the round started
    pub start_time: Seconds,
    /// When the round ends (>= start_time)
    pub end_time: Seconds,
}

impl Round {
    /// Start round `number` at `now` for `duration` seconds.
    pub fn begin(number: u64, minigame: MinigameId, now: Seconds, duration: Seconds) -> Self {
        Self {
            number,
            minigame,
            start_time: now,
            end_time: now + duration.max(0.0),
        }
    }

    /// Whether a real minigame is running.
    pub fn is_active(&self) -> bool {
        !self.minigame.is_none()
    }

    /// Planned length of the round.
    pub fn duration(&self) -> Seconds {
        self.end_time - self.start_time
    }

    /// `max(0, end_time - now)`, or zero with no active round.
    pub fn time_remaining(&self, now: Seconds) -> Seconds {
        if !self.is_active() {
            return 0.0;
        }
        (self.end_time - now).max(0.0)
    }

    /// Drop back to the idle sentinel, keeping the round counter.
    pub fn reset(&mut self) {
        *self = Self {
            number: self.number,
            ..Self::default()
        };
    }
}
