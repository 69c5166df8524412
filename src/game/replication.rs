//! Replication Bridge
//!
//! Authority → observer projection of the round state.
//!
//! Two channels with different granularity:
//! - `broadcast`: one [`ReplicationMessage::MinigameChanged`] per change of
//!   the current minigame, including the `None` pass-through between
//!   rounds. Never coalesced.
//! - `watch`: the latest [`ReplicatedRoundState`]. Time remaining lives
//!   here only; observers sample it, nobody is notified per update.

use serde::{Serialize, Deserialize};
use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::core::clock::Seconds;
use crate::game::minigame::MinigameId;

/// Discrete notification capacity per observer before it lags.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Replicated projection of the round state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedRoundState {
    /// Round counter
    pub round: u64,
    /// Current minigame
    pub current_minigame: MinigameId,
    /// Seconds left in the round (0 when idle)
    pub time_remaining: Seconds,
}

/// Discrete replication message.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReplicationMessage {
    /// The current minigame changed
    MinigameChanged {
        /// Round counter at the change
        round: u64,
        /// Value before the change
        previous: MinigameId,
        /// Value after the change
        current: MinigameId,
    },
}

/// Authority-side writer. Owned by the scheduler.
#[derive(Debug)]
pub struct ReplicationBridge {
    state: ReplicatedRoundState,
    changes_tx: broadcast::Sender<ReplicationMessage>,
    samples_tx: watch::Sender<ReplicatedRoundState>,
}

impl ReplicationBridge {
    /// Create a bridge in the idle state.
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (samples_tx, _) = watch::channel(ReplicatedRoundState::default());
        Self {
            state: ReplicatedRoundState::default(),
            changes_tx,
            samples_tx,
        }
    }

    /// Set the current minigame. Emits one notification if it changed.
    pub fn set_current_minigame(&mut self, round: u64, minigame: MinigameId) -> bool {
        let previous = self.state.current_minigame;
        self.state.round = round;
        if previous == minigame {
            return false;
        }

        self.state.current_minigame = minigame;
        if minigame.is_none() {
            self.state.time_remaining = 0.0;
        }

        // No subscribers is fine; the sample below still holds the value
        let _ = self.changes_tx.send(ReplicationMessage::MinigameChanged {
            round,
            previous,
            current: minigame,
        });
        self.samples_tx.send_replace(self.state);
        true
    }

    /// Refresh the sampled time remaining. Never notifies.
    pub fn set_time_remaining(&mut self, time_remaining: Seconds) {
        self.state.time_remaining = time_remaining.max(0.0);
        self.samples_tx.send_replace(self.state);
    }

    /// Current replicated values.
    pub fn state(&self) -> ReplicatedRoundState {
        self.state
    }

    /// Current minigame.
    pub fn current_minigame(&self) -> MinigameId {
        self.state.current_minigame
    }

    /// Current time remaining.
    pub fn time_remaining(&self) -> Seconds {
        self.state.time_remaining
    }

    /// Subscribe a new observer.
    pub fn subscribe(&self) -> ReplicaObserver {
        self.handle().subscribe()
    }

    /// Cloneable handle other tasks use to create observers.
    pub fn handle(&self) -> ReplicationHandle {
        ReplicationHandle {
            changes_tx: self.changes_tx.clone(),
            samples_rx: self.samples_tx.subscribe(),
        }
    }

    /// Number of live observers on the discrete channel.
    pub fn observer_count(&self) -> usize {
        self.changes_tx.receiver_count()
    }
}

impl Default for ReplicationBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle to a bridge, safe to move to other tasks.
#[derive(Clone, Debug)]
pub struct ReplicationHandle {
    changes_tx: broadcast::Sender<ReplicationMessage>,
    samples_rx: watch::Receiver<ReplicatedRoundState>,
}

impl ReplicationHandle {
    /// Subscribe a new observer starting from the latest sample.
    pub fn subscribe(&self) -> ReplicaObserver {
        let samples_rx = self.samples_rx.clone();
        let local = *samples_rx.borrow();
        ReplicaObserver {
            changes_rx: self.changes_tx.subscribe(),
            samples_rx,
            local,
        }
    }

    /// Latest sampled state.
    pub fn sample(&self) -> ReplicatedRoundState {
        *self.samples_rx.borrow()
    }
}

/// Minigame change seen by an observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinigameChange {
    /// Round counter at the change
    pub round: u64,
    /// Value before
    pub previous: MinigameId,
    /// Value after
    pub current: MinigameId,
}

/// Observer-side replica. Never writes back.
#[derive(Debug)]
pub struct ReplicaObserver {
    changes_rx: broadcast::Receiver<ReplicationMessage>,
    samples_rx: watch::Receiver<ReplicatedRoundState>,
    local: ReplicatedRoundState,
}

impl ReplicaObserver {
    /// Drain pending minigame changes in order and refresh the sample.
    ///
    /// Each returned change is the "minigame changed" notification for
    /// UI/VFX. A lagging observer resyncs from the latest sample.
    pub fn poll(&mut self) -> Vec<MinigameChange> {
        let mut changes = Vec::new();
        loop {
            match self.changes_rx.try_recv() {
                Ok(message) => changes.push(self.apply(message)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Observer lagged, {} minigame changes skipped", skipped);
                    self.local.current_minigame = self.samples_rx.borrow().current_minigame;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        self.refresh_sample();
        changes
    }

    /// Wait for the next minigame change.
    ///
    /// Returns `None` once the authority is gone.
    pub async fn next_change(&mut self) -> Option<MinigameChange> {
        loop {
            match self.changes_rx.recv().await {
                Ok(message) => return Some(self.apply(message)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Observer lagged, {} minigame changes skipped", skipped);
                    self.local.current_minigame = self.samples_rx.borrow().current_minigame;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Latest sampled state (time remaining is always fresh here).
    pub fn sample(&mut self) -> ReplicatedRoundState {
        self.refresh_sample();
        self.local
    }

    /// Minigame as seen through delivered notifications.
    pub fn current_minigame(&self) -> MinigameId {
        self.local.current_minigame
    }

    /// Last sampled time remaining.
    pub fn time_remaining(&self) -> Seconds {
        self.local.time_remaining
    }

    fn apply(&mut self, message: ReplicationMessage) -> MinigameChange {
        match message {
            ReplicationMessage::MinigameChanged { round, previous, current } => {
                self.local.current_minigame = current;
                self.local.round = round;
                MinigameChange { round, previous, current }
            }
        }
    }

    fn refresh_sample(&mut self) {
        let latest = *self.samples_rx.borrow_and_update();
        self.local.time_remaining = latest.time_remaining;
        self.local.round = self.local.round.max(latest.round);
    }
}
