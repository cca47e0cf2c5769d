//! Match configuration, loadable from JSON.

use crate::error::GameError;
use crate::map::Map;
use serde::{Deserialize, Serialize};

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 0x1546_6666;

/// Settings fixed for the lifetime of a [`crate::game::Game`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Seed for the game's private random source.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of apples kept on the map.
    #[serde(default = "default_target_apples")]
    pub target_apples: u32,
    /// Grid steps per second for every player.
    #[serde(default = "default_player_velocity")]
    pub player_velocity: f32,
    /// Map as text rows, top row first. An open 10x10 arena when absent.
    #[serde(default)]
    pub map: Option<Vec<String>>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_target_apples() -> u32 {
    1
}

fn default_player_velocity() -> f32 {
    1.0
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            target_apples: default_target_apples(),
            player_velocity: default_player_velocity(),
            map: None,
        }
    }
}

impl GameConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Builds the configured map.
    pub fn build_map(&self) -> Result<Map, GameError> {
        match &self.map {
            Some(rows) => Map::parse(rows),
            None => Ok(Map::default()),
        }
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if !(self.player_velocity.is_finite() && self.player_velocity > 0.0) {
            return Err(GameError::InvalidVelocity(self.player_velocity));
        }
        Ok(())
    }
}
