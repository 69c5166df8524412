//! Protocol Messages
//!
//! Wire format between the arena server and its observers over WebSocket.
//! All messages are serialized as JSON for debugging ease,
//! with binary (bincode) helpers for the flat payloads.

use serde::{Serialize, Deserialize};

use crate::core::clock::Seconds;
use crate::game::minigame::MinigameId;
use crate::game::replication::{MinigameChange, ReplicatedRoundState};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from an observer to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Spawn a player character for this connection.
    Join {
        /// Requested identity (UUID string); a fresh one is assigned when absent.
        #[serde(default)]
        player_id: Option<String>,
    },

    /// Despawn this connection's character.
    Leave,

    /// Request the current round state.
    SyncRequest,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from the server to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    Welcome(WelcomeInfo),

    /// The current minigame changed (includes the idle pass-through).
    MinigameChanged(MinigameChangedInfo),

    /// Periodic round clock sample.
    RoundClock(RoundClockUpdate),

    /// This connection's character was spawned.
    Joined { player_id: String },

    /// This connection's character was despawned.
    Left { player_id: String },

    /// Pong response.
    Pong { timestamp: u64, server_time: i64 },

    /// Error message.
    Error(ProtocolError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Connection greeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeInfo {
    /// Server version.
    pub server_version: String,
    /// Simulation tick rate (Hz).
    pub tick_rate: u32,
    /// Round state at connect time.
    pub state: RoundClockUpdate,
}

/// Minigame change notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinigameChangedInfo {
    /// Round counter at the change.
    pub round: u64,
    /// Value before.
    pub previous: MinigameId,
    /// Value after.
    pub current: MinigameId,
}

impl From<MinigameChange> for MinigameChangedInfo {
    fn from(change: MinigameChange) -> Self {
        Self {
            round: change.round,
            previous: change.previous,
            current: change.current,
        }
    }
}

/// Sampled round state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundClockUpdate {
    /// Round counter.
    pub round: u64,
    /// Current minigame.
    pub current_minigame: MinigameId,
    /// Seconds left in the round.
    pub time_remaining: Seconds,
    /// Server wall clock (Unix millis).
    pub server_time: i64,
}

impl RoundClockUpdate {
    /// Stamp a replicated sample with the current wall clock.
    pub fn from_sample(sample: ReplicatedRoundState) -> Self {
        Self {
            round: sample.round,
            current_minigame: sample.current_minigame,
            time_remaining: sample.time_remaining,
            server_time: unix_millis(),
        }
    }
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ProtocolError {
    /// Create an error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidMessage,
    /// Requested player id is malformed.
    InvalidPlayerId,
    /// Connection already has a character.
    AlreadyJoined,
    /// Requested player id belongs to a character already in the arena.
    PlayerIdTaken,
    /// Connection has no character.
    NotJoined,
    /// Arena runtime is not accepting commands.
    ArenaUnavailable,
}

/// Current wall clock in Unix milliseconds.
pub fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl RoundClockUpdate {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_without_id_parses() {
        let msg = ClientMessage::from_json(r#"{"type":"join"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { player_id: None }));

        let msg = ClientMessage::from_json(r#"{"type":"ping","timestamp":42}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping { timestamp: 42 }));
    }

    #[test]
    fn test_minigame_changed_json() {
        let msg = ServerMessage::MinigameChanged(MinigameChangedInfo {
            round: 3,
            previous: MinigameId::IceFloor,
            current: MinigameId::None,
        });

        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"minigame_changed\""));
        assert!(json.contains("\"previous\":\"ice_floor\""));

        match ServerMessage::from_json(&json).unwrap() {
            ServerMessage::MinigameChanged(info) => {
                assert_eq!(info.round, 3);
                assert_eq!(info.current, MinigameId::None);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_round_clock_binary() {
        // Tagged enums don't go through bincode; the flat payload does
        let update = RoundClockUpdate {
            round: 7,
            current_minigame: MinigameId::IceFloor,
            time_remaining: 12.5,
            server_time: 1_700_000_000_000,
        };

        let bytes = update.to_bytes().unwrap();
        assert_eq!(RoundClockUpdate::from_bytes(&bytes).unwrap(), update);
    }

    #[test]
    fn test_clock_from_sample() {
        let sample = ReplicatedRoundState {
            round: 2,
            current_minigame: MinigameId::IceFloor,
            time_remaining: 4.0,
        };
        let update = RoundClockUpdate::from_sample(sample);
        assert_eq!(update.round, 2);
        assert_eq!(update.time_remaining, 4.0);
        assert!(update.server_time > 0);
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::Error(ProtocolError::new(ErrorCode::NotJoined, "Join first"));
        let json = msg.to_json().unwrap();
        assert!(json.contains("not_joined"));
    }
}
