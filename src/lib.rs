//! # Chaos Arena Server
//!
//! Server-authoritative chaos round controller for Chaos Arena.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CHAOS ARENA SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Injected primitives                      │
//! │  ├── clock.rs     - Monotonic and manual clocks              │
//! │  ├── timer.rs     - One-shot timer queue                     │
//! │  └── rng.rs       - Deterministic Xorshift128+ PRNG          │
//! │                                                              │
//! │  game/            - Round logic (synchronous)                │
//! │  ├── scheduler.rs - Round state machine                      │
//! │  ├── effect.rs    - Minigame effects and registry            │
//! │  ├── snapshot.rs  - Pre-effect movement baselines            │
//! │  ├── replication.rs - Authority to observer channels         │
//! │  └── world.rs     - Entities and movement components         │
//! │                                                              │
//! │  network/         - Tasks and transport                      │
//! │  ├── runtime.rs   - Arena task (ticks, timers, commands)     │
//! │  ├── server.rs    - WebSocket observer server                │
//! │  └── protocol.rs  - Message types                            │
//! │                                                              │
//! │  config.rs        - JSON config with env overrides           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Only a scheduler built with [`game::Authority::Server`] ever changes
//! round state or movement parameters. Observers follow along through
//! [`game::ReplicaObserver`]: one notification per minigame change, and a
//! sampled time remaining.
//!
//! Given the same seed, clock readings and call sequence, the scheduler
//! picks the same minigames and durations on every run.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{ArenaConfig, ConfigError};
pub use core::rng::DeterministicRng;
pub use game::{Authority, EffectRegistry, MinigameId, RoundConfig, RoundScheduler};
pub use network::{ArenaHandle, ArenaRuntime, ObserverServer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const DEFAULT_TICK_RATE: u32 = 60;
