//! Minigame Effects
//!
//! Each minigame's gameplay modifier is an object implementing
//! [`MinigameEffect`], registered by id in an [`EffectRegistry`]. The
//! registry only dispatches; the scheduler never matches on minigame ids.

use std::collections::HashMap;
use std::sync::Arc;

use crate::game::minigame::MinigameId;
use crate::game::world::{MovementParams, MovementTarget};

/// Apply/revert capability for one minigame.
pub trait MinigameEffect: Send + Sync {
    /// Override the target's live movement parameters.
    ///
    /// Must be safe to call repeatedly; each call re-asserts the override.
    fn apply(&self, target: &mut dyn MovementTarget);

    /// Undo [`MinigameEffect::apply`] given the values captured before it.
    fn revert(&self, target: &mut dyn MovementTarget, prior: &MovementParams) {
        prior.write_to(target);
    }
}

/// Ice floor ground friction.
pub const ICE_FLOOR_FRICTION: f32 = 0.2;

/// Ice floor braking deceleration.
pub const ICE_FLOOR_BRAKING: f32 = 200.0;

/// Slippery floor: low friction and weak braking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IceFloorEffect {
    /// Friction while active
    pub ground_friction: f32,
    /// Braking deceleration while active
    pub braking_deceleration: f32,
}

impl Default for IceFloorEffect {
    fn default() -> Self {
        Self {
            ground_friction: ICE_FLOOR_FRICTION,
            braking_deceleration: ICE_FLOOR_BRAKING,
        }
    }
}

impl MinigameEffect for IceFloorEffect {
    fn apply(&self, target: &mut dyn MovementTarget) {
        target.set_ground_friction(self.ground_friction);
        target.set_braking_deceleration(self.braking_deceleration);
    }
}

/// Minigame id → effect table.
#[derive(Clone, Default)]
pub struct EffectRegistry {
    effects: HashMap<MinigameId, Arc<dyn MinigameEffect>>,
}

impl EffectRegistry {
    /// Registry with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every effect this crate ships.
    pub fn with_builtin_effects() -> Self {
        let mut registry = Self::new();
        registry.register(MinigameId::IceFloor, Arc::new(IceFloorEffect::default()));
        registry
    }

    /// Register (or replace) the effect for a minigame.
    ///
    /// The sentinel can never carry an effect; registering it is ignored.
    pub fn register(&mut self, minigame: MinigameId, effect: Arc<dyn MinigameEffect>) {
        if minigame.is_none() {
            return;
        }
        self.effects.insert(minigame, effect);
    }

    /// Effect for a minigame, if registered.
    pub fn get(&self, minigame: MinigameId) -> Option<&Arc<dyn MinigameEffect>> {
        self.effects.get(&minigame)
    }

    /// Whether the minigame has an effect.
    pub fn is_registered(&self, minigame: MinigameId) -> bool {
        self.effects.contains_key(&minigame)
    }

    /// Apply a minigame's effect. Unregistered ids are a no-op.
    pub fn apply(&self, minigame: MinigameId, target: &mut dyn MovementTarget) -> bool {
        match self.effects.get(&minigame) {
            Some(effect) => {
                effect.apply(target);
                true
            }
            None => false,
        }
    }

    /// Revert a minigame's effect. Unregistered ids are a no-op.
    pub fn revert(
        &self,
        minigame: MinigameId,
        target: &mut dyn MovementTarget,
        prior: &MovementParams,
    ) -> bool {
        match self.effects.get(&minigame) {
            Some(effect) => {
                effect.revert(target, prior);
                true
            }
            None => false,
        }
    }

    /// Registered minigame ids (unordered).
    pub fn registered(&self) -> impl Iterator<Item = MinigameId> + '_ {
        self.effects.keys().copied()
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.registered().collect();
        ids.sort();
        f.debug_struct("EffectRegistry").field("effects", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::CharacterMovement;

    #[test]
    fn test_ice_floor_round_trip() {
        let registry = EffectRegistry::with_builtin_effects();
        let mut movement = CharacterMovement {
            ground_friction: 3.25,
            braking_deceleration_walking: 1500.5,
            max_walk_speed: 600.0,
        };
        let prior = MovementParams::read_from(&movement);

        assert!(registry.apply(MinigameId::IceFloor, &mut movement));
        assert_eq!(movement.ground_friction, 0.2);
        assert_eq!(movement.braking_deceleration_walking, 200.0);

        assert!(registry.revert(MinigameId::IceFloor, &mut movement, &prior));
        assert_eq!(movement.ground_friction, 3.25);
        assert_eq!(movement.braking_deceleration_walking, 1500.5);
    }

    #[test]
    fn test_unregistered_is_noop() {
        let registry = EffectRegistry::with_builtin_effects();
        let mut movement = CharacterMovement::default();
        let before = movement;
        let prior = MovementParams {
            ground_friction: 0.0,
            braking_deceleration: 0.0,
        };

        assert!(!registry.apply(MinigameId::None, &mut movement));
        assert!(!registry.apply(MinigameId::DodgeBalls, &mut movement));
        assert!(!registry.revert(MinigameId::LowGravity, &mut movement, &prior));
        assert_eq!(movement, before);
    }

    #[test]
    fn test_sentinel_cannot_be_registered() {
        let mut registry = EffectRegistry::new();
        registry.register(MinigameId::None, Arc::new(IceFloorEffect::default()));
        assert!(!registry.is_registered(MinigameId::None));
    }

    #[test]
    fn test_custom_effect_registration() {
        struct Sticky;
        impl MinigameEffect for Sticky {
            fn apply(&self, target: &mut dyn MovementTarget) {
                target.set_ground_friction(50.0);
            }
        }

        let mut registry = EffectRegistry::new();
        registry.register(MinigameId::FallingTiles, Arc::new(Sticky));

        let mut movement = CharacterMovement::default();
        registry.apply(MinigameId::FallingTiles, &mut movement);
        assert_eq!(movement.ground_friction, 50.0);
        assert_eq!(movement.braking_deceleration_walking, 2048.0);
    }
}
