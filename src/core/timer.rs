//! One-shot Timers
//!
//! Timers never call back into their owner. The simulation task polls
//! [`Timer::take_due`] and dispatches the returned handles itself, so a
//! fire always runs on the same task as the periodic tick.

use serde::{Serialize, Deserialize};

use super::clock::Seconds;

/// Opaque handle to a scheduled one-shot timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw handle value (for logging).
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One-shot timer service.
pub trait Timer {
    /// Schedule a timer firing `delay` seconds after `now`.
    fn schedule(&mut self, now: Seconds, delay: Seconds) -> TimerHandle;

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Remove and return every timer due at `now`, earliest deadline first.
    fn take_due(&mut self, now: Seconds) -> Vec<TimerHandle>;
}

#[derive(Clone, Copy, Debug)]
struct PendingTimer {
    handle: TimerHandle,
    deadline: Seconds,
}

/// Simple timer queue polled by the simulation loop.
///
/// Handles are monotonic and never reused, so a cancelled handle can
/// never alias a newer timer.
#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: Vec<PendingTimer>,
    next_handle: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending timers.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Deadline of a pending timer.
    pub fn deadline(&self, handle: TimerHandle) -> Option<Seconds> {
        self.pending
            .iter()
            .find(|t| t.handle == handle)
            .map(|t| t.deadline)
    }
}

impl Timer for TimerQueue {
    fn schedule(&mut self, now: Seconds, delay: Seconds) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(PendingTimer {
            handle,
            deadline: now + delay.max(0.0),
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.handle != handle);
        self.pending.len() != before
    }

    fn take_due(&mut self, now: Seconds) -> Vec<TimerHandle> {
        let mut due: Vec<PendingTimer> = Vec::new();
        self.pending.retain(|t| {
            if t.deadline <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });

        due.sort_by(|a, b| {
            a.deadline
                .total_cmp(&b.deadline)
                .then(a.handle.cmp(&b.handle))
        });
        due.into_iter().map(|t| t.handle).collect()
    }
}
