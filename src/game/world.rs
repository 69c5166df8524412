//! Arena World
//!
//! Entity identity, the movement-parameter interface effects act on, and
//! the concrete world the server runs. The scheduler only ever sees the
//! [`EntityEnumerator`] and [`MovementLookup`] traits.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Deserialize};

// =============================================================================
// ENTITY ID
// =============================================================================

/// Stable entity identity (UUID as bytes).
///
/// Holding an `EntityId` never keeps the entity alive; every access goes
/// through a world lookup that may come back empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct EntityId(pub [u8; 16]);

impl EntityId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random identity.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

// =============================================================================
// MOVEMENT INTERFACE
// =============================================================================

/// Movement parameters an effect may override.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementParams {
    /// Ground friction coefficient
    pub ground_friction: f32,
    /// Deceleration applied when walking with no input
    pub braking_deceleration: f32,
}

impl MovementParams {
    /// Read the current values from a target.
    pub fn read_from(target: &dyn MovementTarget) -> Self {
        Self {
            ground_friction: target.ground_friction(),
            braking_deceleration: target.braking_deceleration(),
        }
    }

    /// Write these values onto a target.
    pub fn write_to(&self, target: &mut dyn MovementTarget) {
        target.set_ground_friction(self.ground_friction);
        target.set_braking_deceleration(self.braking_deceleration);
    }
}

/// Per-entity movement component, owned by the character movement system.
pub trait MovementTarget {
    /// Current ground friction.
    fn ground_friction(&self) -> f32;
    /// Set ground friction.
    fn set_ground_friction(&mut self, value: f32);
    /// Current braking deceleration.
    fn braking_deceleration(&self) -> f32;
    /// Set braking deceleration.
    fn set_braking_deceleration(&mut self, value: f32);
}

/// Supplies the entities chaos effects apply to.
pub trait EntityEnumerator {
    /// Snapshot of the affected entities at call time.
    fn affected_entities(&self) -> Vec<EntityId>;
}

/// Resolves entity identity to a live movement component.
pub trait MovementLookup {
    /// `None` when the entity no longer exists (or has no movement).
    fn movement(&self, id: EntityId) -> Option<&dyn MovementTarget>;

    /// Mutable variant of [`MovementLookup::movement`].
    fn movement_mut(&mut self, id: EntityId) -> Option<&mut dyn MovementTarget>;
}

/// A world the round scheduler can drive.
pub trait World: EntityEnumerator + MovementLookup {}

impl<T: EntityEnumerator + MovementLookup + ?Sized> World for T {}

// =============================================================================
// CHARACTERS
// =============================================================================

/// Default ground friction for a fresh character.
pub const DEFAULT_GROUND_FRICTION: f32 = 8.0;

/// Default walking braking deceleration for a fresh character.
pub const DEFAULT_BRAKING_DECELERATION: f32 = 2048.0;

/// Character movement component.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterMovement {
    /// Ground friction
    pub ground_friction: f32,
    /// Braking deceleration while walking
    pub braking_deceleration_walking: f32,
    /// Max walk speed (untouched by chaos effects)
    pub max_walk_speed: f32,
}

impl Default for CharacterMovement {
    fn default() -> Self {
        Self {
            ground_friction: DEFAULT_GROUND_FRICTION,
            braking_deceleration_walking: DEFAULT_BRAKING_DECELERATION,
            max_walk_speed: 600.0,
        }
    }
}

impl MovementTarget for CharacterMovement {
    fn ground_friction(&self) -> f32 {
        self.ground_friction
    }

    fn set_ground_friction(&mut self, value: f32) {
        self.ground_friction = value;
    }

    fn braking_deceleration(&self) -> f32 {
        self.braking_deceleration_walking
    }

    fn set_braking_deceleration(&mut self, value: f32) {
        self.braking_deceleration_walking = value;
    }
}

/// What kind of character an entity is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacterKind {
    /// Playing character, affected by chaos effects
    Player,
    /// Free-flying spectator pawn, never affected
    Spectator,
}

/// A character in the arena.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    /// Identity
    pub id: EntityId,
    /// Player or spectator
    pub kind: CharacterKind,
    /// Movement component
    pub movement: CharacterMovement,
}

impl Character {
    /// Player character with default movement.
    pub fn player(id: EntityId) -> Self {
        Self {
            id,
            kind: CharacterKind::Player,
            movement: CharacterMovement::default(),
        }
    }

    /// Spectator pawn with default movement.
    pub fn spectator(id: EntityId) -> Self {
        Self {
            id,
            kind: CharacterKind::Spectator,
            movement: CharacterMovement::default(),
        }
    }
}

// =============================================================================
// ARENA WORLD
// =============================================================================

/// All characters in one arena.
///
/// BTreeMap keeps enumeration order stable across runs.
#[derive(Clone, Debug, Default)]
pub struct ArenaWorld {
    characters: BTreeMap<EntityId, Character>,
}

impl ArenaWorld {
    /// Empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a character.
    pub fn spawn(&mut self, character: Character) -> EntityId {
        let id = character.id;
        self.characters.insert(id, character);
        id
    }

    /// Remove a character. Returns it if it existed.
    pub fn despawn(&mut self, id: EntityId) -> Option<Character> {
        self.characters.remove(&id)
    }

    /// Look up a character.
    pub fn get(&self, id: EntityId) -> Option<&Character> {
        self.characters.get(&id)
    }

    /// Look up a character mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    /// Whether the entity is alive.
    pub fn contains(&self, id: EntityId) -> bool {
        self.characters.contains_key(&id)
    }

    /// Number of characters of every kind.
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Whether the world has no characters.
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Number of player characters.
    pub fn player_count(&self) -> usize {
        self.characters
            .values()
            .filter(|c| c.kind == CharacterKind::Player)
            .count()
    }
}

impl EntityEnumerator for ArenaWorld {
    fn affected_entities(&self) -> Vec<EntityId> {
        self.characters
            .values()
            .filter(|c| c.kind == CharacterKind::Player)
            .map(|c| c.id)
            .collect()
    }
}

impl MovementLookup for ArenaWorld {
    fn movement(&self, id: EntityId) -> Option<&dyn MovementTarget> {
        self.characters
            .get(&id)
            .map(|c| &c.movement as &dyn MovementTarget)
    }

    fn movement_mut(&mut self, id: EntityId) -> Option<&mut dyn MovementTarget> {
        self.characters
            .get_mut(&id)
            .map(|c| &mut c.movement as &mut dyn MovementTarget)
    }
}
