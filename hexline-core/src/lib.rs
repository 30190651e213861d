//! Hexline Core - world state and move resolution
//!
//! This crate provides the deterministic core of a turn-based hex strategy game:
//! - Hex geometry and A* pathfinding
//! - Terrain and unit rule tables
//! - A layered, copy-on-write world store
//! - Seeded combat resolution
//! - The move pipeline: validate on a child layer, discard, reapply in order

pub mod hex;
pub mod pathfinding;
pub mod terrain;
pub mod units;
pub mod world;
pub mod combat;
pub mod moves;
pub mod processor;
pub mod replay;
pub mod rules;
pub mod config;
pub mod session;
pub mod error;

// Re-exports for convenient access
pub use hex::{AxialCoord, Bounds, CoordKey, DIRECTIONS};
pub use terrain::{TerrainId, TerrainRules, TerrainType, IMPASSABLE};
pub use units::{UnitCatalog, UnitType, UnitTypeId};
pub use world::{snapshot_hash, PlayerId, Tile, TurnState, Unit, UnitId, World, WorldSnapshot};
pub use combat::{CombatResolver, CombatTable, DamageDistribution, DamageRange, MIN_DAMAGE};
pub use moves::{Action, ChangeResult, CoinsReason, Move, MoveKind};
pub use processor::MoveProcessor;
pub use rules::Rules;
pub use config::SessionConfig;
pub use session::{RngState, Session, SessionSnapshot};
pub use error::{PathError, ReplayError, RulesError, StateError, ValidationError, WorldError};
