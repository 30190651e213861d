//! Error taxonomy
//!
//! - [`WorldError`]: a single world mutation could not be performed
//! - [`ValidationError`]: a submitted move is illegal; becomes a `Rejected` change
//! - [`StateError`]: an invariant broke inside a layer; the whole batch aborts
//! - [`ReplayError`]: a recorded change does not fit the world it is applied to
//! - [`PathError`]: pathfinding failed
//! - [`RulesError`]: inconsistent rule tables

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hex::AxialCoord;
use crate::terrain::TerrainId;
use crate::units::UnitTypeId;
use crate::world::{PlayerId, UnitId};

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WorldError {
    #[error("no unit at source {0}")]
    NoUnitAtSource(AxialCoord),
    #[error("destination {0} is occupied")]
    DestinationOccupied(AxialCoord),
    #[error("{0} is outside the map")]
    OutOfBounds(AxialCoord),
    #[error("no tile at {0}")]
    NoTileAt(AxialCoord),
    #[error("no unit at {0}")]
    NoUnitAt(AxialCoord),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("no path from {from} to {to}")]
    NoPathFound { from: AxialCoord, to: AxialCoord },
}

/// Why a move was rejected. Recoverable: the batch continues.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("game is over, player {winner} won")]
    GameOver { winner: PlayerId },
    #[error("it is player {current}'s turn, not player {player}'s")]
    NotPlayersTurn { player: PlayerId, current: PlayerId },
    #[error("unit {unit} is not at {at}")]
    UnitNotFound { unit: UnitId, at: AxialCoord },
    #[error("unit {unit} belongs to player {owner}, not player {player}")]
    NotOwner { unit: UnitId, owner: PlayerId, player: PlayerId },
    #[error("unit {unit} has no movement left")]
    NoMovementLeft { unit: UnitId },
    #[error("unit {unit} needs {needed} movement but has {available}")]
    InsufficientMovement { unit: UnitId, needed: u32, available: u32 },
    #[error("unit is already at {at}")]
    SameTile { at: AxialCoord },
    #[error("{at} is impassable")]
    Impassable { at: AxialCoord },
    #[error("no path from {from} to {to}")]
    NoPath { from: AxialCoord, to: AxialCoord },
    #[error("unit {unit} cannot attack")]
    CannotAttack { unit: UnitId },
    #[error("unit {unit} has already attacked this turn")]
    AlreadyAttacked { unit: UnitId },
    #[error("no unit to attack at {at}")]
    TargetNotFound { at: AxialCoord },
    #[error("unit at {at} is friendly")]
    FriendlyTarget { at: AxialCoord },
    #[error("target at distance {distance} is outside attack range {range}")]
    OutOfRange { distance: u32, range: u32 },
    #[error("tile at {at} is not owned by player {player}")]
    TileNotOwned { at: AxialCoord, player: PlayerId },
    #[error("terrain {terrain} at {at} cannot build unit type {unit_type}")]
    CannotBuild { unit_type: UnitTypeId, terrain: TerrainId, at: AxialCoord },
    #[error("unknown unit type {unit_type}")]
    UnknownUnitType { unit_type: UnitTypeId },
    #[error("player {player} needs {needed} coins but has {available}")]
    InsufficientCoins { player: PlayerId, needed: u32, available: u32 },
    #[error("tile at {at} is already owned by player {player}")]
    TileAlreadyOwned { at: AxialCoord, player: PlayerId },
    #[error("unit {unit} cannot capture the tile at {at}")]
    CannotCapture { unit: UnitId, at: AxialCoord },
    #[error("unit {unit} is already capturing")]
    AlreadyCapturing { unit: UnitId },
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Invariant violation inside a transaction layer. Fatal to the batch.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("copy-on-write source missing at {coord}")]
    CopyOnWriteSourceMissing { coord: AxialCoord },
    #[error("unit {unit} has unknown type {unit_type}")]
    UnknownUnitType { unit: UnitId, unit_type: UnitTypeId },
    #[error("unit ids exhausted")]
    UnitIdsExhausted,
    #[error("world rejected a validated mutation: {0}")]
    World(#[from] WorldError),
    #[error("reapply failed at change {index}: {source}")]
    Replay {
        index: usize,
        #[source]
        source: ReplayError,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("unit {unit} not found at {at}")]
    UnitMissing { unit: UnitId, at: AxialCoord },
    #[error("tile missing at {0}")]
    TileMissing(AxialCoord),
    #[error("recorded state for unit {unit} disagrees with its destination {at}")]
    Inconsistent { unit: UnitId, at: AxialCoord },
    #[error("built unit {unit} leaves no id to allocate next")]
    UnitIdOverflow { unit: UnitId },
    #[error(transparent)]
    World(#[from] WorldError),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("duplicate unit type id {0}")]
    DuplicateUnitType(UnitTypeId),
    #[error("duplicate terrain id {0}")]
    DuplicateTerrain(TerrainId),
    #[error("duplicate damage table for {attacker} -> {defender}")]
    DuplicateMatchup { attacker: UnitTypeId, defender: UnitTypeId },
    #[error("terrain {0} has zero movement cost")]
    ZeroMovementCost(TerrainId),
    #[error("damage table {attacker} -> {defender} is empty or has no weight")]
    EmptyDistribution { attacker: UnitTypeId, defender: UnitTypeId },
    #[error("damage range {min}..={max} for {attacker} -> {defender} is inverted")]
    InvertedRange { attacker: UnitTypeId, defender: UnitTypeId, min: u32, max: u32 },
    #[error("unit type {unit_type} referenced by {context} is not defined")]
    UnknownUnitType { unit_type: UnitTypeId, context: String },
    #[error("unit type {0} has zero max health")]
    ZeroHealth(UnitTypeId),
}
