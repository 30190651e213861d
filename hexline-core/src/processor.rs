//! Move processing
//!
//! A batch runs against a child layer pushed over root. Each move is
//! validated on a topped-up copy of its actor, then applied to the layer and
//! recorded as one or more [`ChangeResult`]s. Rejected moves leave the layer
//! as it was; a [`StateError`] aborts the batch. The layer is dropped before
//! the caller may touch root again, so reapply (see [`crate::replay`]) can only
//! start once validation is over.

use std::collections::BTreeSet;

use rand::Rng;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::combat::{Combatant, CombatResolver};
use crate::error::{StateError, ValidationError, WorldError};
use crate::hex::AxialCoord;
use crate::moves::{Action, ChangeResult, CoinsReason, Move};
use crate::pathfinding::{find_path, path_cost, reachable, unit_movement_cost};
use crate::rules::Rules;
use crate::units::{UnitType, UnitTypeId};
use crate::world::{PlayerId, TurnState, Unit, UnitId, World};

/// Why processing a single move stopped
#[derive(Debug, Error)]
enum MoveError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
}

impl From<WorldError> for MoveError {
    /// World errors past validation mean the layer disagrees with itself
    fn from(err: WorldError) -> Self {
        MoveError::State(StateError::World(err))
    }
}

/// Restore movement and heal by `heal`, capped at max health. Happens once
/// per turn, the first time a unit is touched.
pub fn top_up(unit: &mut Unit, unit_type: &UnitType, turn: u32, heal: u32) {
    if unit.last_topped_up_turn < turn {
        unit.movement_left = unit_type.movement;
        unit.health = unit.health.saturating_add(heal).min(unit_type.max_health);
        unit.last_topped_up_turn = turn;
    }
}

pub struct MoveProcessor<'r> {
    rules: &'r Rules,
    num_players: u8,
}

impl<'r> MoveProcessor<'r> {
    pub fn new(rules: &'r Rules, num_players: u8) -> Self {
        Self {
            rules,
            num_players: num_players.max(1),
        }
    }

    pub fn rules(&self) -> &'r Rules {
        self.rules
    }

    // ========================================================================
    // BATCH
    // ========================================================================

    /// Validate and resolve a batch on a throwaway layer over `root`.
    /// Root is only read; the returned changes are what reapply commits.
    pub fn process_moves<R: Rng + ?Sized>(
        &self,
        root: &World<'_>,
        rng: &mut R,
        moves: &[Move],
    ) -> Result<Vec<ChangeResult>, StateError> {
        tracing::debug!("Processing batch of {} moves", moves.len());

        let mut layer = root.push();
        let mut changes = Vec::with_capacity(moves.len());
        for (index, mv) in moves.iter().enumerate() {
            let produced = self.process_move(&mut layer, rng, index, mv).map_err(|err| {
                tracing::warn!("Aborting batch at move {}: {}", index, err);
                err
            })?;
            changes.extend(produced);
        }

        let rejected = changes.iter().filter(|c| c.is_rejected()).count();
        tracing::debug!(
            "Batch resolved: {} changes, {} rejected moves",
            changes.len() - rejected,
            rejected
        );
        Ok(changes)
    }

    /// Process one move against `layer`. Validation failures come back as a
    /// single `Rejected` change.
    pub fn process_move<R: Rng + ?Sized>(
        &self,
        layer: &mut World<'_>,
        rng: &mut R,
        index: usize,
        mv: &Move,
    ) -> Result<Vec<ChangeResult>, StateError> {
        match self.dispatch(layer, rng, mv) {
            Ok(changes) => Ok(changes),
            Err(MoveError::Invalid(reason)) => {
                tracing::debug!("Move {} by player {} rejected: {}", index, mv.player, reason);
                Ok(vec![ChangeResult::Rejected {
                    move_index: index,
                    reason,
                }])
            }
            Err(MoveError::State(err)) => Err(err),
        }
    }

    fn dispatch<R: Rng + ?Sized>(
        &self,
        layer: &mut World<'_>,
        rng: &mut R,
        mv: &Move,
    ) -> Result<Vec<ChangeResult>, MoveError> {
        let turn = layer.turn_state();
        if let Some(winner) = turn.winner {
            return Err(ValidationError::GameOver { winner }.into());
        }
        if mv.player != turn.current_player {
            return Err(ValidationError::NotPlayersTurn {
                player: mv.player,
                current: turn.current_player,
            }
            .into());
        }

        match mv.action {
            Action::MoveUnit { unit, from, to } => self.move_unit(layer, &turn, mv.player, unit, from, to),
            Action::Attack { unit, from, target } => {
                self.attack(layer, rng, &turn, mv.player, unit, from, target)
            }
            Action::Build { at, unit_type } => self.build(layer, &turn, mv.player, at, unit_type),
            Action::Capture { unit, at } => self.capture(layer, &turn, mv.player, unit, at),
            Action::EndTurn => self.end_turn(layer, &turn),
        }
    }

    // ========================================================================
    // MOVE
    // ========================================================================

    fn move_unit(
        &self,
        layer: &mut World<'_>,
        turn: &TurnState,
        player: PlayerId,
        unit_id: UnitId,
        from: AxialCoord,
        to: AxialCoord,
    ) -> Result<Vec<ChangeResult>, MoveError> {
        let (mut unit, _) = self.actor(layer, player, unit_id, from, turn.turn)?;

        if from == to {
            return Err(ValidationError::SameTile { at: to }.into());
        }
        if unit.movement_left == 0 {
            return Err(ValidationError::NoMovementLeft { unit: unit.id }.into());
        }
        if !layer.is_valid_position(to) {
            return Err(ValidationError::World(WorldError::OutOfBounds(to)).into());
        }
        let dest = layer
            .tile_at(to)
            .ok_or(ValidationError::World(WorldError::NoTileAt(to)))?;
        if layer.unit_at(to).is_some() {
            return Err(ValidationError::World(WorldError::DestinationOccupied(to)).into());
        }
        if self.rules.terrain.movement_cost(dest.terrain, unit.unit_type).is_none() {
            return Err(ValidationError::Impassable { at: to }.into());
        }

        let needed = {
            let cost = unit_movement_cost(layer, &self.rules.terrain, unit.unit_type, player);
            let path = find_path(from, to, &cost).map_err(|_| ValidationError::NoPath { from, to })?;
            path_cost(&path, &cost).ok_or(ValidationError::NoPath { from, to })?
        };
        if needed > unit.movement_left {
            return Err(ValidationError::InsufficientMovement {
                unit: unit.id,
                needed,
                available: unit.movement_left,
            }
            .into());
        }

        unit.movement_left -= needed;
        unit.last_acted_turn = turn.turn;
        unit.coord = to;
        // Leaving the tile abandons any capture in progress
        unit.capture_started_turn = None;
        *layer.move_unit(from, to)? = unit.clone();

        Ok(vec![ChangeResult::UnitMoved {
            unit: unit.id,
            from,
            to,
            cost: needed,
            updated: unit,
        }])
    }

    // ========================================================================
    // CAPTURE
    // ========================================================================

    /// Start taking the tile under the unit. Ownership changes when its owner's
    /// next turn begins, provided the unit is still there.
    fn capture(
        &self,
        layer: &mut World<'_>,
        turn: &TurnState,
        player: PlayerId,
        unit_id: UnitId,
        at: AxialCoord,
    ) -> Result<Vec<ChangeResult>, MoveError> {
        let (mut unit, unit_type) = self.actor(layer, player, unit_id, at, turn.turn)?;

        let tile = layer
            .tile_at(at)
            .ok_or(ValidationError::World(WorldError::NoTileAt(at)))?;
        if tile.owner == Some(player) {
            return Err(ValidationError::TileAlreadyOwned { at, player }.into());
        }
        let capturable = self.rules.terrain.get(tile.terrain).is_some_and(|t| t.capturable);
        if !unit_type.can_capture || !capturable {
            return Err(ValidationError::CannotCapture { unit: unit.id, at }.into());
        }
        if unit.is_capturing() {
            return Err(ValidationError::AlreadyCapturing { unit: unit.id }.into());
        }

        unit.capture_started_turn = Some(turn.turn);
        unit.last_acted_turn = turn.turn;
        unit.movement_left = 0;
        *layer.acquire_unit(at)? = unit.clone();

        Ok(vec![ChangeResult::CaptureStarted {
            unit: unit.id,
            at,
            updated: unit,
        }])
    }

    // ========================================================================
    // ATTACK
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    fn attack<R: Rng + ?Sized>(
        &self,
        layer: &mut World<'_>,
        rng: &mut R,
        turn: &TurnState,
        player: PlayerId,
        unit_id: UnitId,
        from: AxialCoord,
        target: AxialCoord,
    ) -> Result<Vec<ChangeResult>, MoveError> {
        let (mut attacker, attacker_type) = self.actor(layer, player, unit_id, from, turn.turn)?;

        if !attacker_type.can_attack() {
            return Err(ValidationError::CannotAttack { unit: attacker.id }.into());
        }
        if attacker.has_attacked(turn.turn) {
            return Err(ValidationError::AlreadyAttacked { unit: attacker.id }.into());
        }
        let mut defender = layer
            .unit_at(target)
            .cloned()
            .ok_or(ValidationError::TargetNotFound { at: target })?;
        if defender.owner == player {
            return Err(ValidationError::FriendlyTarget { at: target }.into());
        }
        let distance = from.distance_to(target);
        if !attacker_type.in_range(distance) {
            return Err(ValidationError::OutOfRange {
                distance,
                range: attacker_type.attack_range,
            }
            .into());
        }
        let defender_type = self.unit_type_of(&defender)?;

        attacker.movement_left = 0;
        attacker.last_acted_turn = turn.turn;
        attacker.last_attacked_turn = turn.turn;

        let outcome = CombatResolver::new(&self.rules.combat).resolve(
            Combatant {
                unit: &attacker,
                unit_type: attacker_type,
                defense_bonus: self.defense_at(layer, from),
            },
            Combatant {
                unit: &defender,
                unit_type: defender_type,
                defense_bonus: self.defense_at(layer, target),
            },
            distance,
            rng,
        );

        *layer.acquire_unit(from)? = attacker.clone();
        let mut changes = vec![ChangeResult::UnitActed {
            unit: attacker.id,
            at: from,
            updated: attacker.clone(),
        }];

        defender.health = outcome.attack.remaining_health;
        changes.extend(self.damage(layer, defender, outcome.attack.damage)?);

        if let Some(counter) = outcome.counter {
            attacker.health = counter.remaining_health;
            changes.extend(self.damage(layer, attacker, counter.damage)?);
        }

        Ok(changes)
    }

    /// Write a damaged unit back and remove it if it died
    fn damage(&self, layer: &mut World<'_>, unit: Unit, damage: u32) -> Result<Vec<ChangeResult>, MoveError> {
        let at = unit.coord;
        *layer.acquire_unit(at)? = unit.clone();
        let mut changes = vec![ChangeResult::UnitDamaged {
            unit: unit.id,
            at,
            damage,
            updated: unit.clone(),
        }];
        if unit.health == 0 {
            layer.remove_unit(at)?;
            changes.push(ChangeResult::UnitDestroyed {
                unit: unit.id,
                at,
                owner: unit.owner,
            });
        }
        Ok(changes)
    }

    fn defense_at(&self, layer: &World<'_>, at: AxialCoord) -> u32 {
        layer
            .tile_at(at)
            .map_or(0, |tile| self.rules.terrain.defense_bonus(tile.terrain))
    }

    // ========================================================================
    // BUILD
    // ========================================================================

    fn build(
        &self,
        layer: &mut World<'_>,
        turn: &TurnState,
        player: PlayerId,
        at: AxialCoord,
        unit_type_id: UnitTypeId,
    ) -> Result<Vec<ChangeResult>, MoveError> {
        let tile = layer
            .tile_at(at)
            .cloned()
            .ok_or(ValidationError::World(WorldError::NoTileAt(at)))?;
        if tile.owner != Some(player) {
            return Err(ValidationError::TileNotOwned { at, player }.into());
        }
        let unit_type = self
            .rules
            .units
            .get(unit_type_id)
            .ok_or(ValidationError::UnknownUnitType { unit_type: unit_type_id })?;
        let buildable = self
            .rules
            .terrain
            .get(tile.terrain)
            .is_some_and(|t| t.can_build(unit_type_id));
        if !buildable {
            return Err(ValidationError::CannotBuild {
                unit_type: unit_type_id,
                terrain: tile.terrain,
                at,
            }
            .into());
        }
        if layer.unit_at(at).is_some() {
            return Err(ValidationError::World(WorldError::DestinationOccupied(at)).into());
        }
        let available = layer.coins(player);
        if available < unit_type.cost {
            return Err(ValidationError::InsufficientCoins {
                player,
                needed: unit_type.cost,
                available,
            }
            .into());
        }

        let id = layer.allocate_unit_id()?;
        let mut unit = Unit::new(id, unit_type_id, at, player, unit_type.max_health, 0);
        unit.last_acted_turn = turn.turn;
        unit.last_topped_up_turn = turn.turn;
        layer.add_unit(unit.clone())?;

        let current = available - unit_type.cost;
        layer.set_coins(player, current);

        Ok(vec![
            ChangeResult::UnitBuilt { unit },
            ChangeResult::CoinsChanged {
                player,
                previous: available,
                current,
                reason: CoinsReason::Build,
            },
        ])
    }

    // ========================================================================
    // END TURN
    // ========================================================================

    /// Pay income to the outgoing player, advance, then top up every unit of
    /// the incoming player (healing them and finishing their captures).
    /// Victory is checked last.
    fn end_turn(&self, layer: &mut World<'_>, turn: &TurnState) -> Result<Vec<ChangeResult>, MoveError> {
        let player = turn.current_player;
        let mut changes = Vec::new();

        let income = self.income_of(layer, player);
        if income > 0 {
            let previous = layer.coins(player);
            let current = previous.saturating_add(income);
            layer.set_coins(player, current);
            changes.push(ChangeResult::CoinsChanged {
                player,
                previous,
                current,
                reason: CoinsReason::Income,
            });
        }

        let next_player = player.wrapping_add(1) % self.num_players;
        let next_turn = if next_player <= player {
            turn.turn.saturating_add(1)
        } else {
            turn.turn
        };

        let mut reset_units = Vec::new();
        let mut incoming: Vec<Unit> = layer.units_of(next_player).cloned().collect();
        incoming.sort_by_key(|u| u.coord);
        for unit in incoming {
            let unit_type = self.unit_type_of(&unit)?;
            let mut updated = unit.clone();
            top_up(&mut updated, unit_type, next_turn, self.heal_amount(layer, &unit, next_turn));
            if updated.capture_started_turn.is_some_and(|started| started < next_turn) {
                updated.capture_started_turn = None;
                changes.extend(self.complete_capture(layer, &updated)?);
            }
            if updated != unit {
                *layer.acquire_unit(updated.coord)? = updated.clone();
                reset_units.push(updated);
            }
        }

        let winner = self.last_player_standing(layer);
        let mut next = layer.turn_state();
        next.current_player = next_player;
        next.turn = next_turn;
        next.winner = winner;
        layer.set_turn_state(next);
        if let Some(winner) = winner {
            tracing::info!("Player {} is the last with units and wins", winner);
        }

        changes.push(ChangeResult::TurnAdvanced {
            previous_player: player,
            next_player,
            previous_turn: turn.turn,
            next_turn,
            winner,
            reset_units,
        });
        Ok(changes)
    }

    /// Sum of terrain income over the tiles `player` owns
    fn income_of(&self, layer: &World<'_>, player: PlayerId) -> u32 {
        layer
            .tiles()
            .filter(|t| t.owner == Some(player))
            .map(|t| self.rules.terrain.get(t.terrain).map_or(0, |kind| kind.income))
            .fold(0, u32::saturating_add)
    }

    /// Hand the tile under a capturing unit over to its owner
    fn complete_capture(&self, layer: &mut World<'_>, unit: &Unit) -> Result<Option<ChangeResult>, StateError> {
        let at = unit.coord;
        let previous_owner = layer
            .tile_at(at)
            .ok_or(StateError::CopyOnWriteSourceMissing { coord: at })?
            .owner;
        if previous_owner == Some(unit.owner) {
            return Ok(None);
        }
        layer.acquire_tile(at)?.owner = Some(unit.owner);
        tracing::debug!("Unit {} captured {} for player {}", unit.id, at, unit.owner);
        Ok(Some(ChangeResult::TileCaptured {
            at,
            previous_owner,
            new_owner: unit.owner,
            by: unit.id,
        }))
    }

    /// Health a unit regains at its top-up for `turn`. Units that acted since
    /// the previous turn, or stand on an enemy's tile, get nothing.
    fn heal_amount(&self, layer: &World<'_>, unit: &Unit, turn: u32) -> u32 {
        if unit.last_acted_turn >= turn.saturating_sub(1).max(1) {
            return 0;
        }
        match layer.tile_at(unit.coord) {
            Some(tile) if tile.owner.map_or(true, |owner| owner == unit.owner) => {
                self.rules.terrain.get(tile.terrain).map_or(0, |kind| kind.heal)
            }
            _ => 0,
        }
    }

    fn last_player_standing(&self, layer: &World<'_>) -> Option<PlayerId> {
        if self.num_players < 2 {
            return None;
        }
        let owners: BTreeSet<PlayerId> = layer.units().map(|u| u.owner).collect();
        match owners.len() {
            1 => owners.into_iter().next(),
            _ => None,
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Hexes the unit at `at` can move to this turn, with their cost
    pub fn movement_options(
        &self,
        world: &World<'_>,
        at: AxialCoord,
    ) -> Result<FxHashMap<AxialCoord, u32>, ValidationError> {
        let turn = world.turn_state();
        let mut unit = world
            .unit_at(at)
            .cloned()
            .ok_or(ValidationError::World(WorldError::NoUnitAt(at)))?;
        let unit_type = self
            .rules
            .units
            .get(unit.unit_type)
            .ok_or(ValidationError::UnknownUnitType { unit_type: unit.unit_type })?;
        let heal = self.heal_amount(world, &unit, turn.turn);
        top_up(&mut unit, unit_type, turn.turn, heal);

        let cost = unit_movement_cost(world, &self.rules.terrain, unit.unit_type, unit.owner);
        let mut options = reachable(at, unit.movement_left, &cost);
        options.retain(|&c, _| world.unit_at(c).is_none());
        Ok(options)
    }

    /// Enemy-held hexes the unit at `at` can attack this turn, sorted
    pub fn attack_options(&self, world: &World<'_>, at: AxialCoord) -> Result<Vec<AxialCoord>, ValidationError> {
        let turn = world.turn_state();
        let unit = world
            .unit_at(at)
            .ok_or(ValidationError::World(WorldError::NoUnitAt(at)))?;
        let unit_type = self
            .rules
            .units
            .get(unit.unit_type)
            .ok_or(ValidationError::UnknownUnitType { unit_type: unit.unit_type })?;
        if !unit_type.can_attack() || unit.has_attacked(turn.turn) {
            return Ok(Vec::new());
        }

        let mut targets: Vec<AxialCoord> = at
            .range(unit_type.attack_range)
            .into_iter()
            .filter(|&c| unit_type.in_range(at.distance_to(c)))
            .filter(|&c| world.unit_at(c).is_some_and(|other| other.owner != unit.owner))
            .collect();
        targets.sort();
        Ok(targets)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Owned, topped-up copy of the acting unit and its type
    fn actor(
        &self,
        layer: &World<'_>,
        player: PlayerId,
        unit_id: UnitId,
        at: AxialCoord,
        turn: u32,
    ) -> Result<(Unit, &'r UnitType), MoveError> {
        let mut unit = layer
            .unit_at(at)
            .filter(|u| u.id == unit_id)
            .cloned()
            .ok_or(ValidationError::UnitNotFound { unit: unit_id, at })?;
        if unit.owner != player {
            return Err(ValidationError::NotOwner {
                unit: unit.id,
                owner: unit.owner,
                player,
            }
            .into());
        }
        let unit_type = self.unit_type_of(&unit)?;
        let heal = self.heal_amount(layer, &unit, turn);
        top_up(&mut unit, unit_type, turn, heal);
        Ok((unit, unit_type))
    }

    fn unit_type_of(&self, unit: &Unit) -> Result<&'r UnitType, StateError> {
        self.rules.units.get(unit.unit_type).ok_or(StateError::UnknownUnitType {
            unit: unit.id,
            unit_type: unit.unit_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::Bounds;
    use crate::rules::{terrain_ids, unit_ids};
    use crate::world::Tile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn plains_world() -> World<'static> {
        let mut world = World::new(Bounds::from_radius(4), TurnState::new(0));
        for c in AxialCoord::new(0, 0).range(4) {
            world.set_tile(Tile::new(c, terrain_ids::PLAINS)).unwrap();
        }
        world
    }

    fn place(world: &mut World<'_>, id: u32, unit_type: UnitTypeId, at: AxialCoord, owner: PlayerId) {
        let rules = Rules::default();
        let max = rules.units.get(unit_type).unwrap();
        world
            .add_unit(Unit::new(UnitId(id), unit_type, at, owner, max.max_health, 0))
            .unwrap();
    }

    fn single(changes: Vec<ChangeResult>) -> ChangeResult {
        assert_eq!(changes.len(), 1, "{:?}", changes);
        changes.into_iter().next().unwrap()
    }

    #[test]
    fn test_top_up_once_per_turn() {
        let kind = UnitType::new(0, "Infantry", 100, 3, 1);
        let mut unit = Unit::new(UnitId(1), 0, AxialCoord::new(0, 0), 0, 70, 0);
        top_up(&mut unit, &kind, 1, 20);
        assert_eq!(unit.movement_left, 3);
        assert_eq!(unit.health, 90);
        unit.movement_left = 1;
        top_up(&mut unit, &kind, 1, 20);
        assert_eq!(unit.movement_left, 1);
        assert_eq!(unit.health, 90);
        top_up(&mut unit, &kind, 2, 20);
        assert_eq!(unit.movement_left, 3);
        assert_eq!(unit.health, 100);
        assert_eq!(unit.last_topped_up_turn, 2);
    }

    #[test]
    fn test_move_tops_up_and_spends() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        place(&mut root, 1, unit_ids::INFANTRY, AxialCoord::new(0, 0), 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut layer = root.push();
        let mv = Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(2, 0));
        match single(processor.process_move(&mut layer, &mut rng, 0, &mv).unwrap()) {
            ChangeResult::UnitMoved { cost, updated, .. } => {
                assert_eq!(cost, 2);
                assert_eq!(updated.movement_left, 1);
                assert_eq!(updated.coord, AxialCoord::new(2, 0));
                assert!(updated.has_acted(1));
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert!(layer.unit_at(AxialCoord::new(2, 0)).is_some());
        assert!(root.unit_at(AxialCoord::new(0, 0)).is_some());
    }

    #[test]
    fn test_move_rejections() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        root.set_tile(Tile::new(AxialCoord::new(0, 1), terrain_ids::WATER)).unwrap();
        place(&mut root, 1, unit_ids::INFANTRY, AxialCoord::new(0, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(-1, 1), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        let cases = [
            (
                Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(4, 0)),
                ValidationError::InsufficientMovement { unit: UnitId(1), needed: 4, available: 3 },
            ),
            (
                Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(0, 1)),
                ValidationError::Impassable { at: AxialCoord::new(0, 1) },
            ),
            (
                Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(-1, 1)),
                ValidationError::World(WorldError::DestinationOccupied(AxialCoord::new(-1, 1))),
            ),
            (
                Move::move_unit(0, UnitId(2), AxialCoord::new(-1, 1), AxialCoord::new(-2, 1)),
                ValidationError::NotOwner { unit: UnitId(2), owner: 1, player: 0 },
            ),
            (
                Move::move_unit(0, UnitId(7), AxialCoord::new(0, 0), AxialCoord::new(-1, 0)),
                ValidationError::UnitNotFound { unit: UnitId(7), at: AxialCoord::new(0, 0) },
            ),
            (
                Move::move_unit(1, UnitId(2), AxialCoord::new(-1, 1), AxialCoord::new(-2, 1)),
                ValidationError::NotPlayersTurn { player: 1, current: 0 },
            ),
            (
                Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(9, 0)),
                ValidationError::World(WorldError::OutOfBounds(AxialCoord::new(9, 0))),
            ),
            (
                Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(1 << 30, 0)),
                ValidationError::World(WorldError::OutOfBounds(AxialCoord::new(1 << 30, 0))),
            ),
            (
                Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(i32::MIN, i32::MAX)),
                ValidationError::World(WorldError::OutOfBounds(AxialCoord::new(i32::MIN, i32::MAX))),
            ),
        ];

        for (index, (mv, expected)) in cases.into_iter().enumerate() {
            let change = single(processor.process_move(&mut layer, &mut rng, index, &mv).unwrap());
            assert_eq!(change, ChangeResult::Rejected { move_index: index, reason: expected });
        }
        assert_eq!(layer.snapshot(), root.snapshot());
    }

    #[test]
    fn test_enemy_blocks_path_friend_does_not() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        place(&mut root, 1, unit_ids::INFANTRY, AxialCoord::new(0, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(1, 0), 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // Straight through a friend costs 2
        let mut layer = root.push();
        let mv = Move::move_unit(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(2, 0));
        let change = single(processor.process_move(&mut layer, &mut rng, 0, &mv).unwrap());
        assert!(matches!(change, ChangeResult::UnitMoved { cost: 2, .. }));
        drop(layer);

        // An enemy on the only direct route forces a detour of 3
        root.remove_unit(AxialCoord::new(1, 0)).unwrap();
        place(&mut root, 3, unit_ids::INFANTRY, AxialCoord::new(1, 0), 1);
        let mut layer = root.push();
        let change = single(processor.process_move(&mut layer, &mut rng, 0, &mv).unwrap());
        assert!(matches!(change, ChangeResult::UnitMoved { cost: 3, .. }));
    }

    #[test]
    fn test_capture_takes_two_turns() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        let city = AxialCoord::new(1, 0);
        root.set_tile(Tile::new(city, terrain_ids::CITY).owned_by(1)).unwrap();
        place(&mut root, 1, unit_ids::INFANTRY, city, 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(-3, 0), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        let started = single(processor.process_move(&mut layer, &mut rng, 0, &Move::capture(0, UnitId(1), city)).unwrap());
        match started {
            ChangeResult::CaptureStarted { unit, at, updated } => {
                assert_eq!((unit, at), (UnitId(1), city));
                assert_eq!(updated.capture_started_turn, Some(1));
                assert_eq!(updated.movement_left, 0);
            }
            other => panic!("unexpected change {:?}", other),
        }
        let again = single(processor.process_move(&mut layer, &mut rng, 1, &Move::capture(0, UnitId(1), city)).unwrap());
        assert_eq!(
            again,
            ChangeResult::Rejected {
                move_index: 1,
                reason: ValidationError::AlreadyCapturing { unit: UnitId(1) },
            }
        );

        // Still the defender's tile while player 1 plays
        let changes = processor.process_move(&mut layer, &mut rng, 2, &Move::end_turn(0)).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(layer.tile_at(city).unwrap().owner, Some(1));

        let changes = processor.process_move(&mut layer, &mut rng, 3, &Move::end_turn(1)).unwrap();
        assert_eq!(
            changes[0],
            ChangeResult::CoinsChanged { player: 1, previous: 0, current: 100, reason: CoinsReason::Income }
        );
        assert_eq!(
            changes[1],
            ChangeResult::TileCaptured { at: city, previous_owner: Some(1), new_owner: 0, by: UnitId(1) }
        );
        match &changes[2] {
            ChangeResult::TurnAdvanced { next_turn, reset_units, .. } => {
                assert_eq!(*next_turn, 2);
                assert_eq!(reset_units.len(), 1);
                assert_eq!(reset_units[0].capture_started_turn, None);
                assert_eq!(reset_units[0].movement_left, 3);
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert_eq!(layer.tile_at(city).unwrap().owner, Some(0));
        assert_eq!(root.tile_at(city).unwrap().owner, Some(1));
    }

    #[test]
    fn test_capture_rejections_and_abandon() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        root.set_tile(Tile::new(AxialCoord::new(1, 0), terrain_ids::CITY)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(-1, 0), terrain_ids::CITY).owned_by(0)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(0, 1), terrain_ids::CITY)).unwrap();
        place(&mut root, 1, unit_ids::INFANTRY, AxialCoord::new(0, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(-1, 0), 0);
        place(&mut root, 3, unit_ids::TANK, AxialCoord::new(0, 1), 0);
        place(&mut root, 4, unit_ids::INFANTRY, AxialCoord::new(1, 0), 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        let cases = [
            (
                Move::capture(0, UnitId(1), AxialCoord::new(0, 0)),
                ValidationError::CannotCapture { unit: UnitId(1), at: AxialCoord::new(0, 0) },
            ),
            (
                Move::capture(0, UnitId(2), AxialCoord::new(-1, 0)),
                ValidationError::TileAlreadyOwned { at: AxialCoord::new(-1, 0), player: 0 },
            ),
            (
                Move::capture(0, UnitId(3), AxialCoord::new(0, 1)),
                ValidationError::CannotCapture { unit: UnitId(3), at: AxialCoord::new(0, 1) },
            ),
        ];
        for (mv, expected) in cases {
            let change = single(processor.process_move(&mut layer, &mut rng, 0, &mv).unwrap());
            assert_eq!(change, ChangeResult::Rejected { move_index: 0, reason: expected });
        }

        // A neutral city can be taken; walking away drops the attempt
        let capture = Move::capture(0, UnitId(4), AxialCoord::new(1, 0));
        assert!(matches!(
            single(processor.process_move(&mut layer, &mut rng, 1, &capture).unwrap()),
            ChangeResult::CaptureStarted { .. }
        ));
        let unit = layer.acquire_unit(AxialCoord::new(1, 0)).unwrap();
        unit.movement_left = 3;
        let leave = Move::move_unit(0, UnitId(4), AxialCoord::new(1, 0), AxialCoord::new(2, 0));
        match single(processor.process_move(&mut layer, &mut rng, 2, &leave).unwrap()) {
            ChangeResult::UnitMoved { updated, .. } => assert!(!updated.is_capturing()),
            other => panic!("unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_attack_sequence() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        place(&mut root, 1, unit_ids::TANK, AxialCoord::new(0, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(1, 0), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut layer = root.push();

        let mv = Move::attack(0, UnitId(1), AxialCoord::new(0, 0), AxialCoord::new(1, 0));
        let changes = processor.process_move(&mut layer, &mut rng, 0, &mv).unwrap();

        match &changes[0] {
            ChangeResult::UnitActed { unit, updated, .. } => {
                assert_eq!(*unit, UnitId(1));
                assert_eq!(updated.movement_left, 0);
                assert!(updated.has_attacked(1));
            }
            other => panic!("unexpected change {:?}", other),
        }
        match &changes[1] {
            ChangeResult::UnitDamaged { unit, damage, updated, .. } => {
                assert_eq!(*unit, UnitId(2));
                assert!(*damage >= 40 && *damage <= 80);
                assert_eq!(updated.health, 100 - damage);
            }
            other => panic!("unexpected change {:?}", other),
        }
        // Infantry survives any tank hit at full health and is adjacent, so it counters
        assert!(matches!(changes[2], ChangeResult::UnitDamaged { unit: UnitId(1), .. }));
        assert_eq!(changes.len(), 3);

        // Second attack in the same turn is refused
        let again = single(processor.process_move(&mut layer, &mut rng, 1, &mv).unwrap());
        assert_eq!(
            again,
            ChangeResult::Rejected {
                move_index: 1,
                reason: ValidationError::AlreadyAttacked { unit: UnitId(1) },
            }
        );
    }

    #[test]
    fn test_attack_rejections() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        place(&mut root, 1, unit_ids::INFANTRY, AxialCoord::new(0, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(1, 0), 0);
        place(&mut root, 3, unit_ids::INFANTRY, AxialCoord::new(3, 0), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        let cases = [
            (AxialCoord::new(1, 0), ValidationError::FriendlyTarget { at: AxialCoord::new(1, 0) }),
            (AxialCoord::new(3, 0), ValidationError::OutOfRange { distance: 3, range: 1 }),
            (AxialCoord::new(-1, 0), ValidationError::TargetNotFound { at: AxialCoord::new(-1, 0) }),
        ];
        for (target, expected) in cases {
            let mv = Move::attack(0, UnitId(1), AxialCoord::new(0, 0), target);
            let change = single(processor.process_move(&mut layer, &mut rng, 0, &mv).unwrap());
            assert_eq!(change, ChangeResult::Rejected { move_index: 0, reason: expected });
        }
    }

    #[test]
    fn test_build() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        root.set_tile(Tile::new(AxialCoord::new(0, 0), terrain_ids::BASE).owned_by(0)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(1, 0), terrain_ids::BASE).owned_by(1)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(2, 0), terrain_ids::CITY).owned_by(0)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(-1, 0), terrain_ids::BASE).owned_by(0)).unwrap();
        root.set_coins(0, 250);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        let built = processor
            .process_move(&mut layer, &mut rng, 0, &Move::build(0, AxialCoord::new(0, 0), unit_ids::TANK))
            .unwrap();
        match &built[0] {
            ChangeResult::UnitBuilt { unit } => {
                assert_eq!(unit.id, UnitId(1));
                assert_eq!(unit.movement_left, 0);
                assert_eq!(unit.health, 100);
                assert_eq!(unit.owner, 0);
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert_eq!(
            built[1],
            ChangeResult::CoinsChanged { player: 0, previous: 250, current: 50, reason: CoinsReason::Build }
        );
        assert_eq!(built.len(), 2);
        assert_eq!(layer.turn_state().next_unit_id, 2);
        assert_eq!(layer.coins(0), 50);
        assert_eq!(root.coins(0), 250);

        let rejections = [
            (
                Move::build(0, AxialCoord::new(0, 0), unit_ids::TANK),
                ValidationError::World(WorldError::DestinationOccupied(AxialCoord::new(0, 0))),
            ),
            (
                Move::build(0, AxialCoord::new(1, 0), unit_ids::TANK),
                ValidationError::TileNotOwned { at: AxialCoord::new(1, 0), player: 0 },
            ),
            (
                Move::build(0, AxialCoord::new(2, 0), unit_ids::TANK),
                ValidationError::CannotBuild {
                    unit_type: unit_ids::TANK,
                    terrain: terrain_ids::CITY,
                    at: AxialCoord::new(2, 0),
                },
            ),
            (
                Move::build(0, AxialCoord::new(2, 0), 42),
                ValidationError::UnknownUnitType { unit_type: 42 },
            ),
            (
                Move::build(0, AxialCoord::new(-1, 0), unit_ids::INFANTRY),
                ValidationError::InsufficientCoins { player: 0, needed: 75, available: 50 },
            ),
        ];
        for (mv, expected) in rejections {
            let change = single(processor.process_move(&mut layer, &mut rng, 1, &mv).unwrap());
            assert_eq!(change, ChangeResult::Rejected { move_index: 1, reason: expected });
        }
        assert_eq!(layer.coins(0), 50);
        assert_eq!(layer.num_units(), 1);
    }

    #[test]
    fn test_end_turn_and_victory() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        place(&mut root, 1, unit_ids::INFANTRY, AxialCoord::new(0, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(2, 0), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        let first = single(processor.process_move(&mut layer, &mut rng, 0, &Move::end_turn(0)).unwrap());
        let mut reset = root.unit_at(AxialCoord::new(2, 0)).unwrap().clone();
        reset.movement_left = 3;
        reset.last_topped_up_turn = 1;
        assert_eq!(
            first,
            ChangeResult::TurnAdvanced {
                previous_player: 0,
                next_player: 1,
                previous_turn: 1,
                next_turn: 1,
                winner: None,
                reset_units: vec![reset.clone()],
            }
        );
        assert_eq!(layer.unit_at(AxialCoord::new(2, 0)), Some(&reset));

        layer.remove_unit(AxialCoord::new(0, 0)).unwrap();
        let second = single(processor.process_move(&mut layer, &mut rng, 1, &Move::end_turn(1)).unwrap());
        assert_eq!(
            second,
            ChangeResult::TurnAdvanced {
                previous_player: 1,
                next_player: 0,
                previous_turn: 1,
                next_turn: 2,
                winner: Some(1),
                reset_units: Vec::new(),
            }
        );

        let after = single(processor.process_move(&mut layer, &mut rng, 2, &Move::end_turn(0)).unwrap());
        assert_eq!(
            after,
            ChangeResult::Rejected {
                move_index: 2,
                reason: ValidationError::GameOver { winner: 1 },
            }
        );
    }

    #[test]
    fn test_end_turn_pays_income() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        root.set_tile(Tile::new(AxialCoord::new(0, 0), terrain_ids::BASE).owned_by(0)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(1, 0), terrain_ids::CITY).owned_by(0)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(2, 0), terrain_ids::CITY).owned_by(1)).unwrap();
        place(&mut root, 1, unit_ids::INFANTRY, AxialCoord::new(-2, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(3, 0), 1);
        root.set_coins(0, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        let changes = processor.process_move(&mut layer, &mut rng, 0, &Move::end_turn(0)).unwrap();
        assert_eq!(
            changes[0],
            ChangeResult::CoinsChanged { player: 0, previous: 10, current: 210, reason: CoinsReason::Income }
        );
        assert!(matches!(changes[1], ChangeResult::TurnAdvanced { next_player: 1, .. }));
        assert_eq!(layer.coins(0), 210);
        assert_eq!(layer.coins(1), 0);
    }

    #[test]
    fn test_rested_units_heal_on_friendly_ground() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        root.set_tile(Tile::new(AxialCoord::new(0, 0), terrain_ids::CITY).owned_by(0)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(-1, 0), terrain_ids::CITY).owned_by(1)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(0, -1), terrain_ids::CITY).owned_by(0)).unwrap();
        root.set_tile(Tile::new(AxialCoord::new(1, -1), terrain_ids::CITY)).unwrap();
        for (id, at) in [(1, (0, 0)), (2, (-1, 0)), (3, (0, -1)), (4, (1, -1))] {
            place(&mut root, id, unit_ids::INFANTRY, AxialCoord::new(at.0, at.1), 0);
            root.acquire_unit(AxialCoord::new(at.0, at.1)).unwrap().health = 40;
        }
        root.acquire_unit(AxialCoord::new(0, -1)).unwrap().last_acted_turn = 1;
        root.acquire_unit(AxialCoord::new(1, -1)).unwrap().health = 95;
        place(&mut root, 5, unit_ids::INFANTRY, AxialCoord::new(3, 0), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut layer = root.push();

        processor.process_move(&mut layer, &mut rng, 0, &Move::end_turn(0)).unwrap();
        processor.process_move(&mut layer, &mut rng, 1, &Move::end_turn(1)).unwrap();

        let health = |q, r| layer.unit_at(AxialCoord::new(q, r)).unwrap().health;
        // Own city heals
        assert_eq!(health(0, 0), 60);
        // Enemy city does not
        assert_eq!(health(-1, 0), 40);
        // Acted last turn
        assert_eq!(health(0, -1), 40);
        // Neutral city heals, capped at max health
        assert_eq!(health(1, -1), 100);
    }

    #[test]
    fn test_options() {
        let rules = Rules::default();
        let processor = MoveProcessor::new(&rules, 2);
        let mut root = plains_world();
        place(&mut root, 1, unit_ids::ARTILLERY, AxialCoord::new(0, 0), 0);
        place(&mut root, 2, unit_ids::INFANTRY, AxialCoord::new(2, 0), 1);
        place(&mut root, 3, unit_ids::INFANTRY, AxialCoord::new(0, 1), 0);

        let moves = processor.movement_options(&root, AxialCoord::new(0, 0)).unwrap();
        assert!(!moves.contains_key(&AxialCoord::new(0, 0)));
        assert!(!moves.contains_key(&AxialCoord::new(0, 1)));
        assert_eq!(moves.get(&AxialCoord::new(0, 2)), Some(&2));
        assert!(moves.values().all(|&c| c <= 2));

        let targets = processor.attack_options(&root, AxialCoord::new(0, 0)).unwrap();
        assert_eq!(targets, vec![AxialCoord::new(2, 0)]);
    }
}
