//! Arena Runtime
//!
//! The single task that owns one arena: its world, its round scheduler and
//! the scheduler's clock and timers. Everything that mutates round state
//! runs here, one step at a time.
//!
//! Other tasks talk to it through an [`ArenaHandle`]: commands go in over
//! an mpsc channel, round state comes out through the replication
//! channels.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ArenaConfig;
use crate::core::clock::{Clock, MonotonicClock};
use crate::core::timer::TimerQueue;
use crate::game::events::{RoundEvent, RoundEventData};
use crate::game::replication::{ReplicaObserver, ReplicatedRoundState, ReplicationHandle};
use crate::game::scheduler::{Authority, RoundScheduler};
use crate::game::world::{ArenaWorld, Character, EntityId};

/// Queued commands per arena before senders wait.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Runtime errors seen by handle holders.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime task has stopped.
    #[error("Arena runtime has stopped")]
    Closed,
}

/// Commands accepted by the runtime.
#[derive(Debug)]
pub enum ArenaCommand {
    /// Spawn a player character and bring it in line with the round.
    /// `reply` gets false when the id is already in the world.
    SpawnPlayer {
        /// Requested character id
        id: EntityId,
        /// Outcome of the spawn
        reply: oneshot::Sender<bool>,
    },
    /// Remove a character from the world.
    DespawnPlayer(EntityId),
}

/// Cloneable handle to a running arena.
#[derive(Clone, Debug)]
pub struct ArenaHandle {
    commands_tx: mpsc::Sender<ArenaCommand>,
    replication: ReplicationHandle,
    shutdown_tx: broadcast::Sender<()>,
    tick_rate: u32,
}

impl ArenaHandle {
    /// Ask the runtime to spawn a player.
    ///
    /// Resolves to false if a character with this id already exists.
    pub async fn spawn_player(&self, id: EntityId) -> Result<bool, RuntimeError> {
        let (reply, outcome) = oneshot::channel();
        self.send(ArenaCommand::SpawnPlayer { id, reply }).await?;
        outcome.await.map_err(|_| RuntimeError::Closed)
    }

    /// Ask the runtime to despawn a player.
    pub async fn despawn_player(&self, id: EntityId) -> Result<(), RuntimeError> {
        self.send(ArenaCommand::DespawnPlayer(id)).await
    }

    async fn send(&self, command: ArenaCommand) -> Result<(), RuntimeError> {
        self.commands_tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::Closed)
    }

    /// New observer of the round state.
    pub fn subscribe(&self) -> ReplicaObserver {
        self.replication.subscribe()
    }

    /// Latest sampled round state.
    pub fn sample(&self) -> ReplicatedRoundState {
        self.replication.sample()
    }

    /// Simulation tick rate (Hz).
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Stop the runtime (and everything listening for shutdown).
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Shutdown signal receiver.
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

/// Counters for the lifetime of a runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Simulation steps run
    pub ticks: u64,
    /// Rounds started
    pub rounds_started: u64,
    /// Entities resynced after joining mid-round
    pub resyncs: u64,
}

/// Owns and drives one arena.
pub struct ArenaRuntime<C: Clock> {
    scheduler: RoundScheduler<C, TimerQueue>,
    world: ArenaWorld,
    tick_period: Duration,
    stats: RuntimeStats,
    commands_rx: mpsc::Receiver<ArenaCommand>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ArenaRuntime<MonotonicClock> {
    /// Create the server-side runtime on the wall clock.
    pub fn new(config: &ArenaConfig, seed: u64) -> (Self, ArenaHandle) {
        Self::with_clock(config, MonotonicClock::new(), seed)
    }
}

impl<C: Clock> ArenaRuntime<C> {
    /// Create a runtime on an explicit clock.
    pub fn with_clock(config: &ArenaConfig, clock: C, seed: u64) -> (Self, ArenaHandle) {
        let scheduler = RoundScheduler::new(
            Authority::Server,
            config.round.clone(),
            clock,
            TimerQueue::new(),
            seed,
        );
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel(1);

        let handle = ArenaHandle {
            commands_tx,
            replication: scheduler.replication_handle(),
            shutdown_tx: shutdown_tx.clone(),
            tick_rate: config.tick_rate,
        };

        let runtime = Self {
            scheduler,
            world: ArenaWorld::new(),
            tick_period: config.tick_period(),
            stats: RuntimeStats::default(),
            commands_rx,
            shutdown_tx,
        };

        (runtime, handle)
    }

    /// Start the round cycle.
    pub fn begin(&mut self) {
        self.scheduler.begin_play(&mut self.world);
        self.drain_events();
    }

    /// One simulation step: due timers, then a fresh time remaining.
    ///
    /// Only the observer push is throttled (see `ArenaConfig::sample_period`);
    /// the replicated sample is current after every step.
    pub fn step(&mut self) {
        self.stats.ticks += 1;
        self.scheduler.update(&mut self.world);
        self.drain_events();
    }

    /// Apply one command.
    pub fn handle_command(&mut self, command: ArenaCommand) {
        match command {
            ArenaCommand::SpawnPlayer { id, reply } => {
                let spawned = self.spawn_player(id);
                // Requester may have given up waiting
                let _ = reply.send(spawned);
            }
            ArenaCommand::DespawnPlayer(id) => {
                if self.world.despawn(id).is_some() {
                    debug!("Despawned player {}", id);
                }
            }
        }
        self.drain_events();
    }

    /// Spawn a player and resync it with the running round.
    ///
    /// Returns false if the entity already exists.
    pub fn spawn_player(&mut self, id: EntityId) -> bool {
        if self.world.contains(id) {
            debug!("Player {} already spawned", id);
            return false;
        }
        self.world.spawn(Character::player(id));
        self.scheduler.apply_current_effect_to_entity(&mut self.world, id);
        debug!("Spawned player {} ({} players)", id, self.world.player_count());
        true
    }

    /// Stop rounds and restore every character.
    pub fn stop(&mut self) {
        self.scheduler.shutdown(&mut self.world);
        self.drain_events();
    }

    /// Run until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> RuntimeStats {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tick_interval = interval(self.tick_period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.begin();
        info!(
            "Arena runtime started ({} players, tick {:?})",
            self.world.player_count(),
            self.tick_period
        );

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.step();
                }
                command = self.commands_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!("All arena handles dropped");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Arena runtime shutting down");
                    break;
                }
            }
        }

        self.stop();
        info!(
            "Arena runtime stopped after {} ticks, {} rounds",
            self.stats.ticks, self.stats.rounds_started
        );
        self.stats
    }

    fn drain_events(&mut self) {
        for event in self.scheduler.take_events() {
            self.record(&event);
        }
    }

    fn record(&mut self, event: &RoundEvent) {
        match event.data {
            RoundEventData::RoundStarted { .. } => self.stats.rounds_started += 1,
            RoundEventData::EntityResynced { .. } => self.stats.resyncs += 1,
            _ => {}
        }
    }

    /// The arena world.
    pub fn world(&self) -> &ArenaWorld {
        &self.world
    }

    /// The arena world, mutably.
    pub fn world_mut(&mut self) -> &mut ArenaWorld {
        &mut self.world
    }

    /// The round scheduler.
    pub fn scheduler(&self) -> &RoundScheduler<C, TimerQueue> {
        &self.scheduler
    }

    /// The round scheduler, mutably.
    pub fn scheduler_mut(&mut self) -> &mut RoundScheduler<C, TimerQueue> {
        &mut self.scheduler
    }

    /// Lifetime counters.
    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }
}
