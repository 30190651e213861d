//! Layered, copy-on-write world store
//!
//! A root [`World`] owns the canonical tiles and units. [`World::push`] creates a
//! child layer that borrows its parent immutably and records only local changes:
//! inserted or replaced objects, plus `Removed` markers that shadow the parent.
//! Lookups fall through to the parent when a layer has no local entry.
//!
//! Writes never reach a parent. Mutating an inherited object first clones it
//! into the local layer ("acquire"); the only mutable references handed out
//! point into the layer's own maps. There is no merge operation: a layer's
//! effect leaves as an ordered list of changes which is replayed onto root.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{StateError, WorldError};
use crate::hex::{AxialCoord, Bounds, CoordKey};
use crate::terrain::TerrainId;
use crate::units::UnitTypeId;

/// Player index, starting at 0
pub type PlayerId = u8;

/// Unique unit identifier within a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "U{}", self.0)
    }
}

/// A map tile
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub coord: AxialCoord,
    pub terrain: TerrainId,
    pub owner: Option<PlayerId>,
}

impl Tile {
    pub fn new(coord: AxialCoord, terrain: TerrainId) -> Self {
        Self { coord, terrain, owner: None }
    }

    pub fn owned_by(mut self, player: PlayerId) -> Self {
        self.owner = Some(player);
        self
    }
}

/// A unit on the map
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub unit_type: UnitTypeId,
    pub coord: AxialCoord,
    pub owner: PlayerId,
    pub health: u32,
    /// Movement points remaining this turn
    pub movement_left: u32,
    pub last_acted_turn: u32,
    pub last_topped_up_turn: u32,
    #[serde(default)]
    pub last_attacked_turn: u32,
    /// Turn a capture of the tile underneath was started, if one is pending
    #[serde(default)]
    pub capture_started_turn: Option<u32>,
}

impl Unit {
    pub fn new(
        id: UnitId,
        unit_type: UnitTypeId,
        coord: AxialCoord,
        owner: PlayerId,
        health: u32,
        movement_left: u32,
    ) -> Self {
        Self {
            id,
            unit_type,
            coord,
            owner,
            health,
            movement_left,
            last_acted_turn: 0,
            last_topped_up_turn: 0,
            last_attacked_turn: 0,
            capture_started_turn: None,
        }
    }

    /// Mark as already topped up for `turn`, so the given movement is kept
    pub fn topped_up_at(mut self, turn: u32) -> Self {
        self.last_topped_up_turn = turn;
        self
    }

    pub fn has_acted(&self, turn: u32) -> bool {
        self.last_acted_turn == turn
    }

    pub fn has_attacked(&self, turn: u32) -> bool {
        self.last_attacked_turn == turn
    }

    pub fn is_capturing(&self) -> bool {
        self.capture_started_turn.is_some()
    }
}

/// Turn bookkeeping, resolved through layers like tiles and units
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnState {
    pub current_player: PlayerId,
    pub turn: u32,
    pub next_unit_id: u32,
    pub winner: Option<PlayerId>,
    /// Coin balance per player index
    #[serde(default)]
    pub coins: Vec<u32>,
}

impl TurnState {
    pub fn new(first_player: PlayerId) -> Self {
        Self {
            current_player: first_player,
            turn: 1,
            next_unit_id: 1,
            winner: None,
            coins: Vec::new(),
        }
    }

    /// Give every one of `num_players` the same balance
    pub fn with_coins(mut self, num_players: u8, amount: u32) -> Self {
        self.coins = vec![amount; num_players as usize];
        self
    }

    pub fn coins(&self, player: PlayerId) -> u32 {
        self.coins.get(player as usize).copied().unwrap_or(0)
    }

    pub fn set_coins(&mut self, player: PlayerId, amount: u32) {
        let index = player as usize;
        if self.coins.len() <= index {
            self.coins.resize(index + 1, 0);
        }
        self.coins[index] = amount;
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Local entry of a layer
#[derive(Clone, Debug)]
enum Slot<T> {
    Present(T),
    /// Shadows whatever the parent holds at this key
    Removed,
}

impl<T> Slot<T> {
    fn present(&self) -> Option<&T> {
        match self {
            Slot::Present(v) => Some(v),
            Slot::Removed => None,
        }
    }
}

/// Canonical, order-independent form of a world's merged state
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub bounds: Bounds,
    pub turn: TurnState,
    /// Sorted by coordinate
    pub tiles: Vec<Tile>,
    /// Sorted by coordinate
    pub units: Vec<Unit>,
}

/// One layer of world state
#[derive(Debug)]
pub struct World<'p> {
    parent: Option<&'p World<'p>>,
    bounds: Bounds,
    tiles: FxHashMap<CoordKey, Slot<Tile>>,
    units: FxHashMap<CoordKey, Slot<Unit>>,
    turn: Option<TurnState>,

    // Merged additions/removals made through this layer
    tiles_added: u32,
    tiles_removed: u32,
    units_added: u32,
    units_removed: u32,
}

impl World<'static> {
    /// Create an empty root world
    pub fn new(bounds: Bounds, turn: TurnState) -> Self {
        Self {
            parent: None,
            bounds,
            tiles: FxHashMap::default(),
            units: FxHashMap::default(),
            turn: Some(turn),
            tiles_added: 0,
            tiles_removed: 0,
            units_added: 0,
            units_removed: 0,
        }
    }

    /// Rebuild a root world from a snapshot
    pub fn from_snapshot(snapshot: &WorldSnapshot) -> Result<Self, WorldError> {
        let mut world = World::new(snapshot.bounds, snapshot.turn.clone());
        for tile in &snapshot.tiles {
            world.set_tile(tile.clone())?;
        }
        for unit in &snapshot.units {
            world.add_unit(unit.clone())?;
        }
        Ok(world)
    }
}

impl<'p> World<'p> {
    // ========================================================================
    // LAYERING
    // ========================================================================

    /// Open a child layer over this one. Nothing is copied.
    pub fn push(&self) -> World<'_> {
        World {
            parent: Some(self),
            bounds: self.bounds,
            tiles: FxHashMap::default(),
            units: FxHashMap::default(),
            turn: None,
            tiles_added: 0,
            tiles_removed: 0,
            units_added: 0,
            units_removed: 0,
        }
    }

    pub fn parent(&self) -> Option<&'p World<'p>> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of layers above this one
    pub fn depth(&self) -> usize {
        self.parent.map_or(0, |p| p.depth() + 1)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn is_valid_position(&self, coord: AxialCoord) -> bool {
        self.bounds.contains(coord)
    }

    pub fn turn_state(&self) -> TurnState {
        match (&self.turn, self.parent) {
            (Some(turn), _) => turn.clone(),
            (None, Some(parent)) => parent.turn_state(),
            (None, None) => TurnState::default(),
        }
    }

    pub fn set_turn_state(&mut self, turn: TurnState) {
        self.turn = Some(turn);
    }

    /// Hand out the next unit id
    pub fn allocate_unit_id(&mut self) -> Result<UnitId, StateError> {
        let mut turn = self.turn_state();
        let id = UnitId(turn.next_unit_id);
        turn.next_unit_id = turn
            .next_unit_id
            .checked_add(1)
            .ok_or(StateError::UnitIdsExhausted)?;
        self.turn = Some(turn);
        Ok(id)
    }

    pub fn coins(&self, player: PlayerId) -> u32 {
        self.turn_state().coins(player)
    }

    /// Overwrite a player's balance in this layer
    pub fn set_coins(&mut self, player: PlayerId, amount: u32) {
        let mut turn = self.turn_state();
        turn.set_coins(player, amount);
        self.turn = Some(turn);
    }

    /// Merged lookup: local entry first, then the parent chain
    pub fn tile_at(&self, coord: AxialCoord) -> Option<&Tile> {
        match self.tiles.get(&coord.key()) {
            Some(slot) => slot.present(),
            None => self.parent.and_then(|p| p.tile_at(coord)),
        }
    }

    /// Merged lookup: local entry first, then the parent chain
    pub fn unit_at(&self, coord: AxialCoord) -> Option<&Unit> {
        match self.units.get(&coord.key()) {
            Some(slot) => slot.present(),
            None => self.parent.and_then(|p| p.unit_at(coord)),
        }
    }

    pub fn num_tiles(&self) -> usize {
        let base = self.parent.map_or(0, |p| p.num_tiles()) as i64;
        (base + self.tiles_added as i64 - self.tiles_removed as i64).max(0) as usize
    }

    pub fn num_units(&self) -> usize {
        let base = self.parent.map_or(0, |p| p.num_units()) as i64;
        (base + self.units_added as i64 - self.units_removed as i64).max(0) as usize
    }

    /// Merged tiles: local entries, then unshadowed parent entries
    pub fn tiles(&self) -> Box<dyn Iterator<Item = &Tile> + '_> {
        let local = self.tiles.values().filter_map(Slot::present);
        match self.parent {
            None => Box::new(local),
            Some(parent) => Box::new(
                local.chain(
                    parent
                        .tiles()
                        .filter(move |t| !self.tiles.contains_key(&t.coord.key())),
                ),
            ),
        }
    }

    /// Merged units: local entries, then unshadowed parent entries
    pub fn units(&self) -> Box<dyn Iterator<Item = &Unit> + '_> {
        let local = self.units.values().filter_map(Slot::present);
        match self.parent {
            None => Box::new(local),
            Some(parent) => Box::new(
                local.chain(
                    parent
                        .units()
                        .filter(move |u| !self.units.contains_key(&u.coord.key())),
                ),
            ),
        }
    }

    pub fn units_of(&self, player: PlayerId) -> impl Iterator<Item = &Unit> + '_ {
        self.units().filter(move |u| u.owner == player)
    }

    pub fn unit_by_id(&self, id: UnitId) -> Option<&Unit> {
        self.units().find(|u| u.id == id)
    }

    // ========================================================================
    // TILE MUTATION
    // ========================================================================

    /// Place or replace a tile, returning the tile it replaced
    pub fn set_tile(&mut self, tile: Tile) -> Result<Option<Tile>, WorldError> {
        if !self.bounds.contains(tile.coord) {
            return Err(WorldError::OutOfBounds(tile.coord));
        }
        let previous = self.tile_at(tile.coord).cloned();
        if previous.is_none() {
            self.tiles_added += 1;
        }
        self.tiles.insert(tile.coord.key(), Slot::Present(tile));
        Ok(previous)
    }

    pub fn remove_tile(&mut self, coord: AxialCoord) -> Result<Tile, WorldError> {
        let key = coord.key();
        let inherited = self.parent.is_some_and(|p| p.tile_at(coord).is_some());
        let removed = match self.tiles.remove(&key) {
            Some(Slot::Present(tile)) => tile,
            Some(Slot::Removed) => {
                self.tiles.insert(key, Slot::Removed);
                return Err(WorldError::NoTileAt(coord));
            }
            None => self
                .parent
                .and_then(|p| p.tile_at(coord))
                .cloned()
                .ok_or(WorldError::NoTileAt(coord))?,
        };
        if inherited {
            self.tiles.insert(key, Slot::Removed);
        }
        self.tiles_removed += 1;
        Ok(removed)
    }

    /// Mutable access to a tile, cloning it into this layer first if inherited
    pub fn acquire_tile(&mut self, coord: AxialCoord) -> Result<&mut Tile, StateError> {
        let key = coord.key();
        if !self.tiles.contains_key(&key) {
            let inherited = self
                .parent
                .and_then(|p| p.tile_at(coord))
                .cloned()
                .ok_or(StateError::CopyOnWriteSourceMissing { coord })?;
            self.tiles.insert(key, Slot::Present(inherited));
        }
        match self.tiles.get_mut(&key) {
            Some(Slot::Present(tile)) => Ok(tile),
            _ => Err(StateError::CopyOnWriteSourceMissing { coord }),
        }
    }

    // ========================================================================
    // UNIT MUTATION
    // ========================================================================

    /// Place a new unit on an existing, empty tile
    pub fn add_unit(&mut self, unit: Unit) -> Result<(), WorldError> {
        let coord = unit.coord;
        if !self.bounds.contains(coord) {
            return Err(WorldError::OutOfBounds(coord));
        }
        if self.tile_at(coord).is_none() {
            return Err(WorldError::NoTileAt(coord));
        }
        if self.unit_at(coord).is_some() {
            return Err(WorldError::DestinationOccupied(coord));
        }
        self.units.insert(coord.key(), Slot::Present(unit));
        self.units_added += 1;
        Ok(())
    }

    /// Remove the unit at `coord`, returning an owned copy of it
    pub fn remove_unit(&mut self, coord: AxialCoord) -> Result<Unit, WorldError> {
        let key = coord.key();
        let inherited = self.parent.is_some_and(|p| p.unit_at(coord).is_some());
        let removed = match self.units.remove(&key) {
            Some(Slot::Present(unit)) => unit,
            Some(Slot::Removed) => {
                self.units.insert(key, Slot::Removed);
                return Err(WorldError::NoUnitAt(coord));
            }
            None => self
                .parent
                .and_then(|p| p.unit_at(coord))
                .cloned()
                .ok_or(WorldError::NoUnitAt(coord))?,
        };
        if inherited {
            self.units.insert(key, Slot::Removed);
        }
        self.units_removed += 1;
        Ok(removed)
    }

    /// Relocate a unit. An inherited unit is copied into this layer; the
    /// parent's object stays where it was.
    pub fn move_unit(&mut self, from: AxialCoord, to: AxialCoord) -> Result<&mut Unit, WorldError> {
        if !self.bounds.contains(to) {
            return Err(WorldError::OutOfBounds(to));
        }
        if self.unit_at(from).is_none() {
            return Err(WorldError::NoUnitAtSource(from));
        }
        if from == to || self.unit_at(to).is_some() {
            return Err(WorldError::DestinationOccupied(to));
        }
        if self.tile_at(to).is_none() {
            return Err(WorldError::NoTileAt(to));
        }

        let mut unit = self.remove_unit(from)?;
        unit.coord = to;
        let key = to.key();
        self.units.insert(key, Slot::Present(unit));
        self.units_added += 1;

        match self.units.get_mut(&key) {
            Some(Slot::Present(unit)) => Ok(unit),
            _ => Err(WorldError::NoUnitAt(to)),
        }
    }

    /// Mutable access to a unit, cloning it into this layer first if inherited
    pub fn acquire_unit(&mut self, coord: AxialCoord) -> Result<&mut Unit, StateError> {
        let key = coord.key();
        if !self.units.contains_key(&key) {
            let inherited = self
                .parent
                .and_then(|p| p.unit_at(coord))
                .cloned()
                .ok_or(StateError::CopyOnWriteSourceMissing { coord })?;
            self.units.insert(key, Slot::Present(inherited));
        }
        match self.units.get_mut(&key) {
            Some(Slot::Present(unit)) => Ok(unit),
            _ => Err(StateError::CopyOnWriteSourceMissing { coord }),
        }
    }

    // ========================================================================
    // SNAPSHOT
    // ========================================================================

    /// Canonical merged state
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut tiles: Vec<Tile> = self.tiles().cloned().collect();
        tiles.sort_by_key(|t| t.coord);
        let mut units: Vec<Unit> = self.units().cloned().collect();
        units.sort_by_key(|u| u.coord);
        WorldSnapshot {
            bounds: self.bounds,
            turn: self.turn_state(),
            tiles,
            units,
        }
    }

    /// Deterministic hash of the merged state; equal for equal snapshots
    /// regardless of how many layers produced them, and identical across
    /// platforms. BLAKE3 over the snapshot's JSON, first eight bytes little-endian.
    pub fn state_hash(&self) -> u64 {
        snapshot_hash(&self.snapshot())
    }
}

/// Portable hash of a snapshot, see [`World::state_hash`]
pub fn snapshot_hash(snapshot: &WorldSnapshot) -> u64 {
    // Snapshots hold no maps, so JSON encoding cannot fail
    let bytes = serde_json::to_vec(snapshot).unwrap_or_default();
    let digest = blake3::hash(&bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

// ============================================================================
// TESTS
// ============================================================================
