//! Arena Configuration
//!
//! Everything the binary needs to bring one arena up, loaded from an
//! optional JSON file. Missing fields take their defaults.
//!
//! ```json
//! {
//!   "round": { "available_minigames": ["ice_floor"], "min_duration": 20.0, "max_duration": 30.0 },
//!   "tick_rate": 60,
//!   "server": { "bind_addr": "0.0.0.0:8080" }
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::derive_arena_seed;
use crate::game::scheduler::RoundConfig;
use crate::network::server::ServerConfig;

/// Environment variable that overrides `server.bind_addr`.
pub const BIND_ENV_VAR: &str = "CHAOS_ARENA_BIND";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for this schema.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Bind address override could not be parsed.
    #[error("Invalid bind address {0:?}")]
    InvalidBindAddr(String),

    /// Duration range is empty, non-positive or non-finite.
    #[error("Invalid round durations: min {min}, max {max}")]
    InvalidDurations {
        /// Configured minimum
        min: f64,
        /// Configured maximum
        max: f64,
    },

    /// Tick rate must be positive.
    #[error("tick_rate must be positive")]
    ZeroTickRate,

    /// Sample interval must be positive.
    #[error("sample_interval_ticks must be positive")]
    ZeroSampleInterval,

    /// Connection limit must be positive.
    #[error("server.max_connections must be positive")]
    ZeroConnections,
}

/// Top-level arena configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Round cycle settings
    pub round: RoundConfig,
    /// Simulation tick rate (Hz)
    pub tick_rate: u32,
    /// Ticks between round clock pushes to observers
    pub sample_interval_ticks: u32,
    /// Fixed RNG seed; derived per arena when absent
    pub seed: Option<u64>,
    /// Observer server settings
    pub server: ServerConfig,
    /// Player characters spawned at startup
    pub demo_players: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            round: RoundConfig::default(),
            tick_rate: crate::DEFAULT_TICK_RATE,
            sample_interval_ticks: 6,
            seed: None,
            server: ServerConfig::default(),
            demo_players: 4,
        }
    }
}

impl ArenaConfig {
    /// Load from a JSON file, or defaults when no path is given.
    ///
    /// Environment overrides are applied and the result validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };

        if let Ok(bind) = std::env::var(BIND_ENV_VAR) {
            config.override_bind_addr(&bind)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON text (no validation).
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Replace the bind address from a string.
    pub fn override_bind_addr(&mut self, bind: &str) -> Result<(), ConfigError> {
        self.server.bind_addr = bind
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr(bind.to_string()))?;
        Ok(())
    }

    /// Check every constraint the runtime relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.round.duration_range().is_valid() {
            return Err(ConfigError::InvalidDurations {
                min: self.round.min_duration,
                max: self.round.max_duration,
            });
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.sample_interval_ticks == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        Ok(())
    }

    /// Length of one simulation tick.
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }

    /// Time between round clock pushes to each observer.
    pub fn sample_period(&self) -> Duration {
        self.tick_period() * self.sample_interval_ticks.max(1)
    }

    /// Seed for an arena: the configured one, or derived from its id.
    pub fn resolve_seed(&self, arena_id: &[u8; 16]) -> u64 {
        match self.seed {
            Some(seed) => seed,
            None => {
                let salt = chrono::Utc::now().timestamp_millis() as u64;
                derive_arena_seed(arena_id, salt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::minigame::MinigameId;

    #[test]
    fn test_defaults_are_valid() {
        let config = ArenaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.round.available_minigames.eligible(), vec![MinigameId::IceFloor]);
        assert_eq!(config.round.min_duration, 20.0);
        assert_eq!(config.round.max_duration, 30.0);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.sample_period(), config.tick_period() * 6);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = ArenaConfig::from_json(
            r#"{ "round": { "available_minigames": ["ice_floor", "dodge_balls"], "max_duration": 45.0 }, "seed": 7 }"#,
        )
        .unwrap();

        assert_eq!(config.round.min_duration, 20.0);
        assert_eq!(config.round.max_duration, 45.0);
        assert_eq!(
            config.round.available_minigames.eligible(),
            vec![MinigameId::IceFloor, MinigameId::DodgeBalls]
        );
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.tick_rate, 60);
    }

    #[test]
    fn test_rejects_bad_durations() {
        let mut config = ArenaConfig::default();
        config.round.min_duration = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDurations { .. })));

        config.round.min_duration = 40.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDurations { .. })));

        config.round.min_duration = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_rates() {
        let mut config = ArenaConfig::default();
        config.tick_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTickRate)));

        let mut config = ArenaConfig::default();
        config.sample_interval_ticks = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroSampleInterval)));
    }

    #[test]
    fn test_bind_override() {
        let mut config = ArenaConfig::default();
        config.override_bind_addr(" 127.0.0.1:9001 ").unwrap();
        assert_eq!(config.server.bind_addr.port(), 9001);

        assert!(matches!(
            config.override_bind_addr("not-an-addr"),
            Err(ConfigError::InvalidBindAddr(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ArenaConfig::load(Some(Path::new("/nonexistent/chaos-arena.json")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_fixed_seed_wins() {
        let config = ArenaConfig { seed: Some(99), ..Default::default() };
        assert_eq!(config.resolve_seed(&[1; 16]), 99);
    }
}
