//! Session configuration

use serde::{Deserialize, Serialize};

use crate::hex::Bounds;
use crate::world::PlayerId;

/// Configuration for a game session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// RNG seed; peers must agree on it to reproduce combat
    pub seed: u64,
    pub num_players: u8,
    pub bounds: Bounds,
    pub first_player: PlayerId,
    /// Balance each player starts with
    #[serde(default)]
    pub starting_coins: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_players: 2,
            bounds: Bounds::default(),
            first_player: 0,
            starting_coins: 300,
        }
    }
}

impl SessionConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of players, at least one
    pub fn with_players(mut self, num_players: u8) -> Self {
        self.num_players = num_players.max(1);
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_first_player(mut self, player: PlayerId) -> Self {
        self.first_player = player;
        self
    }

    pub fn with_starting_coins(mut self, coins: u32) -> Self {
        self.starting_coins = coins;
        self
    }
}
