//! Session context: root world, rules and the seeded RNG
//!
//! The RNG is owned here and threaded explicitly into the processor. Two
//! sessions built from the same snapshot and fed the same moves produce the
//! same changes and the same state hash.

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{StateError, WorldError};
use crate::moves::{ChangeResult, Move};
use crate::processor::MoveProcessor;
use crate::replay;
use crate::rules::Rules;
use crate::world::{TurnState, World, WorldSnapshot};

/// Position in the ChaCha stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: [u8; 32],
    pub word_pos: u128,
}

impl RngState {
    pub fn capture(rng: &ChaCha8Rng) -> Self {
        Self {
            seed: rng.get_seed(),
            word_pos: rng.get_word_pos(),
        }
    }

    pub fn restore(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_word_pos(self.word_pos);
        rng
    }
}

/// Everything a peer needs, besides the rules, to continue a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub config: SessionConfig,
    pub world: WorldSnapshot,
    pub rng: RngState,
}

pub struct Session {
    config: SessionConfig,
    rules: Rules,
    world: World<'static>,
    rng: ChaCha8Rng,
}

impl Session {
    /// Start a session on an empty map
    pub fn new(config: SessionConfig, rules: Rules) -> Self {
        let world = World::new(
            config.bounds,
            TurnState::new(config.first_player).with_coins(config.num_players, config.starting_coins),
        );
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            rules,
            world,
            rng,
        }
    }

    pub fn from_snapshot(snapshot: &SessionSnapshot, rules: Rules) -> Result<Self, WorldError> {
        Ok(Self {
            config: snapshot.config.clone(),
            rules,
            world: World::from_snapshot(&snapshot.world)?,
            rng: snapshot.rng.restore(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn world(&self) -> &World<'static> {
        &self.world
    }

    /// Direct root access, for map setup before play
    pub fn world_mut(&mut self) -> &mut World<'static> {
        &mut self.world
    }

    pub fn rng_state(&self) -> RngState {
        RngState::capture(&self.rng)
    }

    pub fn processor(&self) -> MoveProcessor<'_> {
        MoveProcessor::new(&self.rules, self.config.num_players)
    }

    /// Validate, resolve and commit a batch. On failure root is unchanged and
    /// the RNG is rewound so a retry draws the same values.
    pub fn process_moves(&mut self, moves: &[Move]) -> Result<Vec<ChangeResult>, StateError> {
        let checkpoint = self.rng.get_word_pos();
        let processor = MoveProcessor::new(&self.rules, self.config.num_players);

        let result = processor
            .process_moves(&self.world, &mut self.rng, moves)
            .and_then(|changes| replay::commit(&mut self.world, &changes).map(|()| changes));

        if result.is_err() {
            self.rng.set_word_pos(checkpoint);
        }
        result
    }

    /// Resolve a batch without committing it or advancing the session RNG
    pub fn simulate(&self, moves: &[Move]) -> Result<Vec<ChangeResult>, StateError> {
        let mut rng = self.rng.clone();
        self.processor().process_moves(&self.world, &mut rng, moves)
    }

    /// Commit changes produced elsewhere. The RNG does not move.
    pub fn apply_changes(&mut self, changes: &[ChangeResult]) -> Result<(), StateError> {
        replay::commit(&mut self.world, changes)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            config: self.config.clone(),
            world: self.world.snapshot(),
            rng: self.rng_state(),
        }
    }

    /// Hash of the root world; peers compare this after a batch
    pub fn state_hash(&self) -> u64 {
        self.world.state_hash()
    }

    pub fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load_snapshot(path: &Path, rules: Rules) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(&snapshot, rules)?)
    }
}
