//! Ordered reapply of recorded changes
//!
//! Changes are applied with the same world mutators the processor uses.
//! [`commit`] first replays the whole list on a scratch layer over root and
//! only touches root once that succeeded.

use crate::error::{ReplayError, StateError};
use crate::hex::AxialCoord;
use crate::moves::ChangeResult;
use crate::world::{Unit, UnitId, World};

/// Apply one change. `Rejected` entries are skipped.
pub fn apply_change(world: &mut World<'_>, change: &ChangeResult) -> Result<(), ReplayError> {
    match change {
        ChangeResult::UnitMoved { unit, from, to, updated, .. } => {
            expect_unit(world, *unit, *from)?;
            if updated.id != *unit || updated.coord != *to {
                return Err(ReplayError::Inconsistent { unit: *unit, at: *to });
            }
            *world.move_unit(*from, *to)? = updated.clone();
        }
        ChangeResult::UnitActed { unit, at, updated }
        | ChangeResult::UnitDamaged { unit, at, updated, .. }
        | ChangeResult::CaptureStarted { unit, at, updated } => {
            overwrite_unit(world, *unit, *at, updated)?;
        }
        ChangeResult::UnitDestroyed { unit, at, .. } => {
            expect_unit(world, *unit, *at)?;
            world.remove_unit(*at)?;
        }
        ChangeResult::UnitBuilt { unit } => {
            let after = unit
                .id
                .0
                .checked_add(1)
                .ok_or(ReplayError::UnitIdOverflow { unit: unit.id })?;
            world.add_unit(unit.clone())?;
            let mut turn = world.turn_state();
            turn.next_unit_id = turn.next_unit_id.max(after);
            world.set_turn_state(turn);
        }
        ChangeResult::TileCaptured { at, new_owner, .. } => {
            let tile = world.acquire_tile(*at).map_err(|_| ReplayError::TileMissing(*at))?;
            tile.owner = Some(*new_owner);
        }
        ChangeResult::CoinsChanged { player, current, .. } => {
            world.set_coins(*player, *current);
        }
        ChangeResult::TurnAdvanced {
            next_player,
            next_turn,
            winner,
            reset_units,
            ..
        } => {
            let mut turn = world.turn_state();
            turn.current_player = *next_player;
            turn.turn = *next_turn;
            turn.winner = *winner;
            world.set_turn_state(turn);
            for unit in reset_units {
                overwrite_unit(world, unit.id, unit.coord, unit)?;
            }
        }
        ChangeResult::Rejected { .. } => {}
    }
    Ok(())
}

/// Apply changes in order, stopping at the first that does not fit
pub fn apply_changes(world: &mut World<'_>, changes: &[ChangeResult]) -> Result<(), StateError> {
    for (index, change) in changes.iter().enumerate() {
        apply_change(world, change).map_err(|source| StateError::Replay { index, source })?;
    }
    Ok(())
}

/// Reapply onto root behind a second rollback boundary: the list is first
/// replayed on a child layer, and root is only mutated if that fully succeeds.
pub fn commit(root: &mut World<'_>, changes: &[ChangeResult]) -> Result<(), StateError> {
    if let Err(err) = apply_changes(&mut root.push(), changes) {
        tracing::warn!("Dry run failed, root left untouched: {}", err);
        return Err(err);
    }
    apply_changes(root, changes)?;
    tracing::info!(
        "Committed {} changes",
        changes.iter().filter(|c| !c.is_rejected()).count()
    );
    Ok(())
}

fn expect_unit(world: &World<'_>, unit: UnitId, at: AxialCoord) -> Result<(), ReplayError> {
    match world.unit_at(at) {
        Some(found) if found.id == unit => Ok(()),
        _ => Err(ReplayError::UnitMissing { unit, at }),
    }
}

fn overwrite_unit(world: &mut World<'_>, unit: UnitId, at: AxialCoord, updated: &Unit) -> Result<(), ReplayError> {
    expect_unit(world, unit, at)?;
    if updated.id != unit || updated.coord != at {
        return Err(ReplayError::Inconsistent { unit, at });
    }
    *world
        .acquire_unit(at)
        .map_err(|_| ReplayError::UnitMissing { unit, at })? = updated.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::Bounds;
    use crate::moves::CoinsReason;
    use crate::world::{Tile, TurnState};

    fn world_with_unit() -> World<'static> {
        let mut world = World::new(Bounds::from_radius(2), TurnState::new(0));
        for c in AxialCoord::new(0, 0).range(2) {
            world.set_tile(Tile::new(c, 0)).unwrap();
        }
        world
            .add_unit(Unit::new(UnitId(1), 0, AxialCoord::new(0, 0), 0, 100, 3))
            .unwrap();
        world
    }

    fn moved(to: AxialCoord) -> ChangeResult {
        let mut updated = Unit::new(UnitId(1), 0, to, 0, 100, 2).topped_up_at(1);
        updated.last_acted_turn = 1;
        ChangeResult::UnitMoved {
            unit: UnitId(1),
            from: AxialCoord::new(0, 0),
            to,
            cost: 1,
            updated,
        }
    }

    #[test]
    fn test_apply_move_sets_absolute_state() {
        let mut world = world_with_unit();
        apply_change(&mut world, &moved(AxialCoord::new(0, 1))).unwrap();
        let unit = world.unit_at(AxialCoord::new(0, 1)).unwrap();
        assert_eq!(unit.movement_left, 2);
        assert_eq!(unit.last_acted_turn, 1);
        assert!(world.unit_at(AxialCoord::new(0, 0)).is_none());
    }

    #[test]
    fn test_apply_rejects_mismatch() {
        let mut world = world_with_unit();
        let wrong = ChangeResult::UnitDestroyed {
            unit: UnitId(9),
            at: AxialCoord::new(0, 0),
            owner: 0,
        };
        assert_eq!(
            apply_change(&mut world, &wrong),
            Err(ReplayError::UnitMissing { unit: UnitId(9), at: AxialCoord::new(0, 0) })
        );

        let mut bad = moved(AxialCoord::new(0, 1));
        if let ChangeResult::UnitMoved { updated, .. } = &mut bad {
            updated.coord = AxialCoord::new(1, 1);
        }
        assert_eq!(
            apply_change(&mut world, &bad),
            Err(ReplayError::Inconsistent { unit: UnitId(1), at: AxialCoord::new(0, 1) })
        );
    }

    #[test]
    fn test_built_unit_advances_id_counter() {
        let mut world = world_with_unit();
        let unit = Unit::new(UnitId(5), 0, AxialCoord::new(1, 0), 0, 100, 0);
        apply_change(&mut world, &ChangeResult::UnitBuilt { unit }).unwrap();
        assert_eq!(world.turn_state().next_unit_id, 6);
        assert_eq!(world.num_units(), 2);
    }

    #[test]
    fn test_built_unit_with_last_id_is_refused() {
        let mut world = world_with_unit();
        let unit = Unit::new(UnitId(u32::MAX), 0, AxialCoord::new(1, 0), 0, 100, 0);
        assert_eq!(
            apply_change(&mut world, &ChangeResult::UnitBuilt { unit }),
            Err(ReplayError::UnitIdOverflow { unit: UnitId(u32::MAX) })
        );
        assert_eq!(world.num_units(), 1);
    }

    #[test]
    fn test_coins_and_turn_reset_replay() {
        let mut world = world_with_unit();
        let coins = ChangeResult::CoinsChanged {
            player: 0,
            previous: 0,
            current: 250,
            reason: CoinsReason::Income,
        };
        apply_change(&mut world, &coins).unwrap();
        assert_eq!(world.coins(0), 250);

        let mut healed = world.unit_at(AxialCoord::new(0, 0)).unwrap().clone();
        healed.health = 100;
        healed.movement_left = 3;
        healed.last_topped_up_turn = 2;
        let advanced = ChangeResult::TurnAdvanced {
            previous_player: 1,
            next_player: 0,
            previous_turn: 1,
            next_turn: 2,
            winner: None,
            reset_units: vec![healed.clone()],
        };
        apply_change(&mut world, &advanced).unwrap();
        assert_eq!(world.turn_state().turn, 2);
        assert_eq!(world.unit_at(AxialCoord::new(0, 0)), Some(&healed));
    }

    #[test]
    fn test_commit_failure_leaves_root_untouched() {
        let mut root = world_with_unit();
        let before = root.snapshot();

        // The second change refers to a unit the first one already moved away
        let changes = vec![moved(AxialCoord::new(0, 1)), moved(AxialCoord::new(1, 0))];
        let err = commit(&mut root, &changes).unwrap_err();
        assert!(matches!(err, StateError::Replay { index: 1, .. }));
        assert_eq!(root.snapshot(), before);
    }

    #[test]
    fn test_commit_skips_rejected() {
        let mut root = world_with_unit();
        let changes = vec![
            ChangeResult::Rejected {
                move_index: 0,
                reason: crate::error::ValidationError::NoMovementLeft { unit: UnitId(1) },
            },
            moved(AxialCoord::new(0, 1)),
        ];
        commit(&mut root, &changes).unwrap();
        assert_eq!(root.unit_at(AxialCoord::new(0, 1)).map(|u| u.id), Some(UnitId(1)));
    }
}
