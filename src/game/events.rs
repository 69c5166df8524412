//! Round Events
//!
//! Structured record of what the scheduler did, drained after each
//! update for logging, metrics hooks and tests.

use serde::{Serialize, Deserialize};

use crate::core::clock::Seconds;
use crate::game::minigame::MinigameId;
use crate::game::world::EntityId;

/// Round event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RoundEventData {
    /// A new round began
    RoundStarted {
        minigame: MinigameId,
        duration: Seconds,
        end_time: Seconds,
    },

    /// The current round ended
    RoundEnded {
        minigame: MinigameId,
    },

    /// Effect applied to an entity
    EffectApplied {
        entity: EntityId,
        minigame: MinigameId,
        /// Whether a fresh baseline was captured
        captured: bool,
    },

    /// Effects reverted at round end
    EffectsCleared {
        restored: usize,
    },

    /// A late-joining entity was brought in line with the active round
    EntityResynced {
        entity: EntityId,
        minigame: MinigameId,
    },
}

/// A round event with timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundEvent {
    /// Round counter when the event happened
    pub round: u64,

    /// Clock time
    pub time: Seconds,

    /// Event data
    pub data: RoundEventData,
}

impl RoundEvent {
    /// Create a new event.
    pub fn new(round: u64, time: Seconds, data: RoundEventData) -> Self {
        Self { round, time, data }
    }

    /// Round started event.
    pub fn round_started(round: u64, time: Seconds, minigame: MinigameId, duration: Seconds) -> Self {
        Self::new(
            round,
            time,
            RoundEventData::RoundStarted {
                minigame,
                duration,
                end_time: time + duration,
            },
        )
    }

    /// Round ended event.
    pub fn round_ended(round: u64, time: Seconds, minigame: MinigameId) -> Self {
        Self::new(round, time, RoundEventData::RoundEnded { minigame })
    }

    /// Effect applied event.
    pub fn effect_applied(
        round: u64,
        time: Seconds,
        entity: EntityId,
        minigame: MinigameId,
        captured: bool,
    ) -> Self {
        Self::new(
            round,
            time,
            RoundEventData::EffectApplied { entity, minigame, captured },
        )
    }

    /// Effects cleared event.
    pub fn effects_cleared(round: u64, time: Seconds, restored: usize) -> Self {
        Self::new(round, time, RoundEventData::EffectsCleared { restored })
    }

    /// Entity resynced event.
    pub fn entity_resynced(round: u64, time: Seconds, entity: EntityId, minigame: MinigameId) -> Self {
        Self::new(
            round,
            time,
            RoundEventData::EntityResynced { entity, minigame },
        )
    }

    /// Entity involved, if any.
    pub fn entity(&self) -> Option<EntityId> {
        match &self.data {
            RoundEventData::EffectApplied { entity, .. } => Some(*entity),
            RoundEventData::EntityResynced { entity, .. } => Some(*entity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_started_end_time() {
        let event = RoundEvent::round_started(1, 10.0, MinigameId::IceFloor, 25.0);
        match event.data {
            RoundEventData::RoundStarted { end_time, .. } => assert_eq!(end_time, 35.0),
            _ => panic!("Wrong event type"),
        }
        assert_eq!(event.entity(), None);
    }

    #[test]
    fn test_entity_extraction() {
        let id = EntityId::new([4; 16]);
        let event = RoundEvent::effect_applied(2, 0.0, id, MinigameId::IceFloor, true);
        assert_eq!(event.entity(), Some(id));
    }
}
