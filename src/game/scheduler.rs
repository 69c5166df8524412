//! Round Scheduler
//!
//! The authoritative chaos round state machine:
//!
//! ```text
//!   begin_play ──► Idle ──start_next_round──► Active(minigame, end_time)
//!                   ▲                               │
//!                   └──── end_current_round ◄── round timer fires
//! ```
//!
//! `end_current_round` always falls straight through into
//! `start_next_round`, so `None` is only ever visible as the discrete
//! notification between two rounds.
//!
//! Every mutating entry point is a silent no-op unless this instance was
//! built with [`Authority::Server`]. Only the one-shot round timer ends a
//! round; `time_remaining` is a published sample and never drives state.

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::clock::{Clock, Seconds};
use crate::core::rng::DeterministicRng;
use crate::core::timer::{Timer, TimerHandle};
use crate::game::effect::EffectRegistry;
use crate::game::events::RoundEvent;
use crate::game::minigame::{MinigameId, MinigamePool};
use crate::game::replication::{ReplicaObserver, ReplicationBridge, ReplicationHandle, ReplicatedRoundState};
use crate::game::round::{DurationRange, Round, DEFAULT_MAX_DURATION, DEFAULT_MIN_DURATION};
use crate::game::snapshot::MovementSnapshotStore;
use crate::game::world::{EntityId, World};

/// Whether this process may mutate round state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    /// The single writer
    Server,
    /// Read-only replica
    Observer,
}

/// Configuration for the round cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Minigames eligible for random selection
    pub available_minigames: MinigamePool,
    /// Shortest round (seconds)
    pub min_duration: Seconds,
    /// Longest round (seconds)
    pub max_duration: Seconds,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            available_minigames: MinigamePool::new([MinigameId::IceFloor]),
            min_duration: DEFAULT_MIN_DURATION,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

impl RoundConfig {
    /// Duration range for sampling.
    pub fn duration_range(&self) -> DurationRange {
        DurationRange::new(self.min_duration, self.max_duration)
    }
}

/// Drives chaos rounds for one arena.
///
/// Owns its clock, timer service, effect registry, snapshot store and
/// replication bridge. The world is borrowed per call since other systems
/// own and mutate it between ticks.
pub struct RoundScheduler<C: Clock, T: Timer> {
    authority: Authority,
    config: RoundConfig,
    registry: EffectRegistry,
    snapshots: MovementSnapshotStore,
    replication: ReplicationBridge,
    rng: DeterministicRng,
    clock: C,
    timer: T,
    round: Round,
    round_timer: Option<TimerHandle>,
    pending_events: Vec<RoundEvent>,
}

impl<C: Clock, T: Timer> RoundScheduler<C, T> {
    /// Create a scheduler with the built-in effects.
    pub fn new(authority: Authority, config: RoundConfig, clock: C, timer: T, seed: u64) -> Self {
        Self {
            authority,
            config,
            registry: EffectRegistry::with_builtin_effects(),
            snapshots: MovementSnapshotStore::new(),
            replication: ReplicationBridge::new(),
            rng: DeterministicRng::new(seed),
            clock,
            timer,
            round: Round::default(),
            round_timer: None,
            pending_events: Vec::new(),
        }
    }

    /// Replace the effect registry.
    pub fn with_registry(mut self, registry: EffectRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Whether this instance may mutate state.
    #[inline]
    pub fn is_authority(&self) -> bool {
        self.authority == Authority::Server
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the round cycle. Called once when the arena comes up.
    ///
    /// The configured pool is used as is: `IceFloor` is not added to it.
    /// It is only drawn when the pool lists it or has nothing eligible.
    pub fn begin_play<W: World + ?Sized>(&mut self, world: &mut W) {
        if !self.is_authority() {
            return;
        }
        info!(
            "Chaos rounds starting: {} eligible minigames, {:.1}-{:.1}s",
            self.config.available_minigames.eligible().len(),
            self.config.min_duration,
            self.config.max_duration,
        );
        self.start_next_round(world);
    }

    /// Pick a minigame, apply it and arm the round timer.
    pub fn start_next_round<W: World + ?Sized>(&mut self, world: &mut W) {
        if !self.is_authority() {
            return;
        }

        // Leftovers from a round that never ended cleanly
        self.clear_effects(world);

        let minigame = self.config.available_minigames.select_random(&mut self.rng);
        let duration = self.config.duration_range().sample(&mut self.rng);
        let now = self.clock.now();
        let number = self.round.number + 1;

        self.round = Round::begin(number, minigame, now, duration);
        self.replication.set_current_minigame(number, minigame);
        self.replication.set_time_remaining(duration);
        self.push_event(RoundEvent::round_started(number, now, minigame, duration));
        info!("Round {} started: {} for {:.1}s", number, minigame, duration);

        self.apply_effects(world);

        if let Some(stale) = self.round_timer.take() {
            self.timer.cancel(stale);
        }
        self.round_timer = Some(self.timer.schedule(now, duration));
    }

    /// Revert the current round and immediately start the next one.
    pub fn end_current_round<W: World + ?Sized>(&mut self, world: &mut W) {
        if !self.is_authority() {
            return;
        }

        let finished = self.round.minigame;
        let now = self.clock.now();

        self.clear_effects(world);
        self.round.reset();
        self.replication.set_current_minigame(self.round.number, MinigameId::None);
        self.replication.set_time_remaining(0.0);
        self.push_event(RoundEvent::round_ended(self.round.number, now, finished));
        info!("Round {} ended: {}", self.round.number, finished);

        self.start_next_round(world);
    }

    /// Stop the cycle: disarm the timer and revert every effect.
    pub fn shutdown<W: World + ?Sized>(&mut self, world: &mut W) {
        if !self.is_authority() {
            return;
        }

        if let Some(pending) = self.round_timer.take() {
            self.timer.cancel(pending);
        }
        let finished = self.round.minigame;
        self.clear_effects(world);
        self.round.reset();
        self.replication.set_current_minigame(self.round.number, MinigameId::None);
        self.replication.set_time_remaining(0.0);

        if !finished.is_none() {
            let now = self.clock.now();
            self.push_event(RoundEvent::round_ended(self.round.number, now, finished));
        }
        info!("Chaos rounds stopped after {} rounds", self.round.number);
    }

    // =========================================================================
    // Effects
    // =========================================================================

    /// Apply the current minigame's effect to every affected entity.
    pub fn apply_effects<W: World + ?Sized>(&mut self, world: &mut W) {
        if !self.is_authority() || !self.registry.is_registered(self.round.minigame) {
            return;
        }
        for id in world.affected_entities() {
            self.apply_effect_to(world, id);
        }
    }

    /// Revert every tracked effect and empty the snapshot store.
    ///
    /// Returns how many live entities were restored.
    pub fn clear_effects<W: World + ?Sized>(&mut self, world: &mut W) -> usize {
        if !self.is_authority() || self.snapshots.is_empty() {
            return 0;
        }

        let registry = &self.registry;
        let restored = self.snapshots.clear_all(world, |target, snapshot| {
            registry.revert(snapshot.minigame, target, &snapshot.params);
        });

        let now = self.clock.now();
        self.push_event(RoundEvent::effects_cleared(self.round.number, now, restored));
        debug!("Reverted chaos effects on {} entities", restored);
        restored
    }

    /// Bring one entity in line with the active round (late join).
    ///
    /// Applies the running effect, or strips any lingering override when
    /// nothing with an effect is running. Round timing is untouched.
    /// `EntityResynced` is only emitted when the entity actually changed.
    pub fn apply_current_effect_to_entity<W: World + ?Sized>(&mut self, world: &mut W, id: EntityId) {
        if !self.is_authority() {
            return;
        }

        let minigame = self.round.minigame;
        let changed = if self.registry.is_registered(minigame) {
            self.apply_effect_to(world, id)
        } else {
            let registry = &self.registry;
            let mut reverted = false;
            self.snapshots.restore(world, id, |target, snapshot| {
                reverted = registry.revert(snapshot.minigame, target, &snapshot.params);
            });
            reverted
        };
        if !changed {
            return;
        }

        let now = self.clock.now();
        self.push_event(RoundEvent::entity_resynced(self.round.number, now, id, minigame));
        debug!("Resynced entity {} to {}", id, minigame);
    }

    fn apply_effect_to<W: World + ?Sized>(&mut self, world: &mut W, id: EntityId) -> bool {
        let minigame = self.round.minigame;
        let Some(effect) = self.registry.get(minigame) else {
            return false;
        };
        let Some(target) = world.movement_mut(id) else {
            return false;
        };

        let captured = self.snapshots.capture(id, minigame, &*target);
        effect.apply(target);

        let now = self.clock.now();
        self.push_event(RoundEvent::effect_applied(self.round.number, now, id, minigame, captured));
        debug!("Applied {} to entity {} (captured: {})", minigame, id, captured);
        true
    }

    // =========================================================================
    // Driving
    // =========================================================================

    /// Periodic tick: refresh the replicated time remaining.
    pub fn tick(&mut self) {
        if !self.is_authority() {
            return;
        }
        let remaining = self.round.time_remaining(self.clock.now());
        self.replication.set_time_remaining(remaining);
    }

    /// Dispatch every timer due now. Returns how many rounds ended.
    pub fn fire_due_timers<W: World + ?Sized>(&mut self, world: &mut W) -> usize {
        if !self.is_authority() {
            return 0;
        }
        let before = self.round.number;
        for handle in self.timer.take_due(self.clock.now()) {
            self.on_timer_fired(world, handle);
        }
        (self.round.number - before) as usize
    }

    /// Timer callback. Fires for anything but the armed round timer are stale.
    pub fn on_timer_fired<W: World + ?Sized>(&mut self, world: &mut W, handle: TimerHandle) {
        if !self.is_authority() {
            return;
        }
        if self.round_timer != Some(handle) {
            debug!("Ignoring stale round timer {}", handle.raw());
            return;
        }
        self.round_timer = None;
        self.end_current_round(world);
    }

    /// One simulation step: timers first, then the tick.
    pub fn update<W: World + ?Sized>(&mut self, world: &mut W) {
        self.fire_due_timers(world);
        self.tick();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current minigame (sentinel when idle).
    pub fn current_minigame(&self) -> MinigameId {
        self.round.minigame
    }

    /// Last published time remaining.
    pub fn time_remaining(&self) -> Seconds {
        self.replication.time_remaining()
    }

    /// Current round.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Round configuration.
    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Effect registry.
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// Snapshot store (read-only).
    pub fn snapshots(&self) -> &MovementSnapshotStore {
        &self.snapshots
    }

    /// Replicated projection.
    pub fn replicated_state(&self) -> ReplicatedRoundState {
        self.replication.state()
    }

    /// Subscribe an in-process observer.
    pub fn subscribe(&self) -> ReplicaObserver {
        self.replication.subscribe()
    }

    /// Handle for observers on other tasks.
    pub fn replication_handle(&self) -> ReplicationHandle {
        self.replication.handle()
    }

    /// Armed round timer, if any.
    pub fn pending_round_timer(&self) -> Option<TimerHandle> {
        self.round_timer
    }

    /// Clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Clock, mutably (manual clocks in tests and headless runs).
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Timer service.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<RoundEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn push_event(&mut self, event: RoundEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
