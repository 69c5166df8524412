//! Minigame Identifiers
//!
//! The chaos modifiers a round can run, and the configured pool the
//! scheduler draws from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;

/// Chaos minigame identifier.
///
/// `None` is the "no active effect" sentinel. Ordering exists only so
/// sets serialize deterministically; it carries no gameplay meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
#[derive(Default)]
pub enum MinigameId {
    /// No active effect
    #[default]
    None = 0,
    /// Slippery floor: low friction and braking
    IceFloor = 1,
    /// Reduced gravity
    LowGravity = 2,
    /// Floor tiles drop away
    FallingTiles = 3,
    /// Projectiles sweep the arena
    DodgeBalls = 4,
}

impl MinigameId {
    /// Every identifier, sentinel included.
    pub const ALL: [MinigameId; 5] = [
        MinigameId::None,
        MinigameId::IceFloor,
        MinigameId::LowGravity,
        MinigameId::FallingTiles,
        MinigameId::DodgeBalls,
    ];

    /// Is this the "no active effect" sentinel?
    #[inline]
    pub fn is_none(self) -> bool {
        self == MinigameId::None
    }

    /// Human-readable name for UI.
    pub fn display_name(self) -> &'static str {
        match self {
            MinigameId::None => "None",
            MinigameId::IceFloor => "Ice Floor",
            MinigameId::LowGravity => "Low Gravity",
            MinigameId::FallingTiles => "Falling Tiles",
            MinigameId::DodgeBalls => "Dodge Balls",
        }
    }

    /// Get from wire index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

impl fmt::Display for MinigameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Minigame picked when the eligible pool is empty.
pub const FALLBACK_MINIGAME: MinigameId = MinigameId::IceFloor;

/// Configured set of minigames eligible for random selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinigamePool {
    available: BTreeSet<MinigameId>,
}

impl MinigamePool {
    /// Build a pool from any list of ids. Duplicates collapse.
    pub fn new(ids: impl IntoIterator<Item = MinigameId>) -> Self {
        Self {
            available: ids.into_iter().collect(),
        }
    }

    /// Ids that may actually be selected (sentinel removed).
    pub fn eligible(&self) -> Vec<MinigameId> {
        self.available
            .iter()
            .copied()
            .filter(|id| !id.is_none())
            .collect()
    }

    /// Whether anything besides the sentinel is configured.
    pub fn has_eligible(&self) -> bool {
        self.available.iter().any(|id| !id.is_none())
    }

    /// Pick a minigame uniformly from the eligible set.
    ///
    /// Never returns [`MinigameId::None`]; an empty pool yields
    /// [`FALLBACK_MINIGAME`] so the round cycle cannot stall.
    pub fn select_random(&self, rng: &mut DeterministicRng) -> MinigameId {
        let eligible = self.eligible();
        rng.choose(&eligible).copied().unwrap_or(FALLBACK_MINIGAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sentinel_filtered() {
        let pool = MinigamePool::new([MinigameId::None, MinigameId::DodgeBalls]);
        assert_eq!(pool.eligible(), vec![MinigameId::DodgeBalls]);
        assert!(pool.has_eligible());
    }

    #[test]
    fn test_empty_pool_falls_back() {
        let mut rng = DeterministicRng::new(1);
        assert_eq!(MinigamePool::default().select_random(&mut rng), MinigameId::IceFloor);

        let only_sentinel = MinigamePool::new([MinigameId::None]);
        assert!(!only_sentinel.has_eligible());
        assert_eq!(only_sentinel.select_random(&mut rng), MinigameId::IceFloor);
    }

    #[test]
    fn test_selection_covers_pool() {
        let pool = MinigamePool::new([MinigameId::IceFloor, MinigameId::LowGravity]);
        let mut rng = DeterministicRng::new(77);
        let picks: BTreeSet<_> = (0..200).map(|_| pool.select_random(&mut rng)).collect();
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn test_pool_json_is_a_list() {
        let pool = MinigamePool::new([MinigameId::LowGravity, MinigameId::IceFloor]);
        let json = serde_json::to_string(&pool).unwrap();
        assert_eq!(json, r#"["ice_floor","low_gravity"]"#);
    }

    #[test]
    fn test_from_index() {
        assert_eq!(MinigameId::from_index(1), Some(MinigameId::IceFloor));
        assert_eq!(MinigameId::from_index(9), None);
    }

    proptest! {
        #[test]
        fn prop_select_never_returns_sentinel(
            seed in any::<u64>(),
            picks in proptest::collection::vec(0u8..5, 0..8),
        ) {
            let pool = MinigamePool::new(picks.into_iter().filter_map(MinigameId::from_index));
            let mut rng = DeterministicRng::new(seed);
            for _ in 0..16 {
                prop_assert!(!pool.select_random(&mut rng).is_none());
            }
        }
    }
}
