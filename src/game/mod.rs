//! Game Logic Module
//!
//! The chaos round controller. Everything here is synchronous and driven
//! by an injected clock and timer, so the same seed and the same call
//! sequence always produce the same rounds.
//!
//! ## Module Structure
//!
//! - `minigame`: Minigame ids and the selection pool
//! - `world`: Entity identity, movement interface, arena world
//! - `effect`: Per-minigame effects and their registry
//! - `snapshot`: Pre-effect movement baselines
//! - `round`: Round timing values
//! - `scheduler`: Authoritative round state machine
//! - `replication`: Authority to observer projection
//! - `events`: Structured round events

pub mod minigame;
pub mod world;
pub mod effect;
pub mod snapshot;
pub mod round;
pub mod scheduler;
pub mod replication;
pub mod events;

// Re-export key types
pub use minigame::{MinigameId, MinigamePool, FALLBACK_MINIGAME};
pub use world::{ArenaWorld, Character, EntityId, EntityEnumerator, MovementLookup, MovementParams, MovementTarget, World};
pub use effect::{EffectRegistry, IceFloorEffect, MinigameEffect};
pub use snapshot::{MovementSnapshot, MovementSnapshotStore};
pub use round::{DurationRange, Round};
pub use scheduler::{Authority, RoundConfig, RoundScheduler};
pub use replication::{ReplicaObserver, ReplicatedRoundState, ReplicationBridge, ReplicationHandle};
pub use events::{RoundEvent, RoundEventData};
