//! Movement Snapshots
//!
//! Pre-effect movement parameters per affected entity. Entries are keyed
//! by identity only and resolved through [`MovementLookup`] on every
//! access, so a destroyed entity simply resolves to nothing.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::game::minigame::MinigameId;
use crate::game::world::{EntityId, MovementLookup, MovementParams, MovementTarget};

/// Baseline captured before an effect touched an entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementSnapshot {
    /// Minigame whose effect was applied on top of this baseline
    pub minigame: MinigameId,
    /// Values to restore on revert
    pub params: MovementParams,
}

/// First-writer-wins store of movement baselines.
#[derive(Clone, Debug, Default)]
pub struct MovementSnapshotStore {
    snapshots: BTreeMap<EntityId, MovementSnapshot>,
}

impl MovementSnapshotStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the target's current parameters unless a snapshot exists.
    ///
    /// Returns true if a new snapshot was stored. An existing one is never
    /// overwritten, so repeated applies keep the true baseline.
    pub fn capture(
        &mut self,
        id: EntityId,
        minigame: MinigameId,
        target: &dyn MovementTarget,
    ) -> bool {
        if self.snapshots.contains_key(&id) {
            return false;
        }
        self.snapshots.insert(id, MovementSnapshot {
            minigame,
            params: MovementParams::read_from(target),
        });
        true
    }

    /// Restore one entity and drop its snapshot.
    ///
    /// `revert` receives the live target and the snapshot; it is skipped
    /// when the entity is gone. Returns true if a snapshot existed.
    pub fn restore<W, F>(&mut self, world: &mut W, id: EntityId, mut revert: F) -> bool
    where
        W: MovementLookup + ?Sized,
        F: FnMut(&mut dyn MovementTarget, &MovementSnapshot),
    {
        let Some(snapshot) = self.snapshots.remove(&id) else {
            return false;
        };
        if let Some(target) = world.movement_mut(id) {
            revert(target, &snapshot);
        }
        true
    }

    /// Restore every tracked entity still alive, then empty the store.
    ///
    /// Returns how many live entities were restored.
    pub fn clear_all<W, F>(&mut self, world: &mut W, mut revert: F) -> usize
    where
        W: MovementLookup + ?Sized,
        F: FnMut(&mut dyn MovementTarget, &MovementSnapshot),
    {
        let mut restored = 0;
        for (id, snapshot) in std::mem::take(&mut self.snapshots) {
            if let Some(target) = world.movement_mut(id) {
                revert(target, &snapshot);
                restored += 1;
            }
        }
        restored
    }

    /// Snapshot for an entity.
    pub fn get(&self, id: EntityId) -> Option<&MovementSnapshot> {
        self.snapshots.get(&id)
    }

    /// Whether the entity is currently tracked.
    pub fn contains(&self, id: EntityId) -> bool {
        self.snapshots.contains_key(&id)
    }

    /// Tracked entity ids in stable order.
    pub fn tracked(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.snapshots.keys().copied()
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
