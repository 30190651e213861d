//! Submitted moves and the changes they produce
//!
//! A [`ChangeResult`] is absolute: unit-bearing variants carry the full
//! updated unit, so replay sets state instead of recomputing it.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::hex::AxialCoord;
use crate::units::UnitTypeId;
use crate::world::{PlayerId, Unit, UnitId};

/// Move kind tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Move,
    Attack,
    Build,
    Capture,
    EndTurn,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    MoveUnit {
        unit: UnitId,
        from: AxialCoord,
        to: AxialCoord,
    },
    Attack {
        unit: UnitId,
        from: AxialCoord,
        target: AxialCoord,
    },
    Build {
        at: AxialCoord,
        unit_type: UnitTypeId,
    },
    /// Start taking the tile the unit stands on; it flips at the owner's next turn
    Capture {
        unit: UnitId,
        at: AxialCoord,
    },
    EndTurn,
}

/// A move submitted by a player
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub player: PlayerId,
    pub action: Action,
}

impl Move {
    pub fn move_unit(player: PlayerId, unit: UnitId, from: AxialCoord, to: AxialCoord) -> Self {
        Self {
            player,
            action: Action::MoveUnit { unit, from, to },
        }
    }

    pub fn attack(player: PlayerId, unit: UnitId, from: AxialCoord, target: AxialCoord) -> Self {
        Self {
            player,
            action: Action::Attack { unit, from, target },
        }
    }

    pub fn build(player: PlayerId, at: AxialCoord, unit_type: UnitTypeId) -> Self {
        Self {
            player,
            action: Action::Build { at, unit_type },
        }
    }

    pub fn capture(player: PlayerId, unit: UnitId, at: AxialCoord) -> Self {
        Self {
            player,
            action: Action::Capture { unit, at },
        }
    }

    pub fn end_turn(player: PlayerId) -> Self {
        Self {
            player,
            action: Action::EndTurn,
        }
    }

    pub fn kind(&self) -> MoveKind {
        match self.action {
            Action::MoveUnit { .. } => MoveKind::Move,
            Action::Attack { .. } => MoveKind::Attack,
            Action::Build { .. } => MoveKind::Build,
            Action::Capture { .. } => MoveKind::Capture,
            Action::EndTurn => MoveKind::EndTurn,
        }
    }
}

/// Why a balance moved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinsReason {
    Build,
    Income,
}

/// One replayable state mutation, or a rejected move
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeResult {
    UnitMoved {
        unit: UnitId,
        from: AxialCoord,
        to: AxialCoord,
        cost: u32,
        updated: Unit,
    },
    /// Attacker's spent state, recorded before any damage
    UnitActed {
        unit: UnitId,
        at: AxialCoord,
        updated: Unit,
    },
    UnitDamaged {
        unit: UnitId,
        at: AxialCoord,
        damage: u32,
        updated: Unit,
    },
    UnitDestroyed {
        unit: UnitId,
        at: AxialCoord,
        owner: PlayerId,
    },
    UnitBuilt {
        unit: Unit,
    },
    CaptureStarted {
        unit: UnitId,
        at: AxialCoord,
        updated: Unit,
    },
    TileCaptured {
        at: AxialCoord,
        previous_owner: Option<PlayerId>,
        new_owner: PlayerId,
        by: UnitId,
    },
    CoinsChanged {
        player: PlayerId,
        previous: u32,
        current: u32,
        reason: CoinsReason,
    },
    TurnAdvanced {
        previous_player: PlayerId,
        next_player: PlayerId,
        previous_turn: u32,
        next_turn: u32,
        winner: Option<PlayerId>,
        /// Incoming player's units after their top-up, only those that changed
        #[serde(default)]
        reset_units: Vec<Unit>,
    },
    Rejected {
        move_index: usize,
        reason: ValidationError,
    },
}

impl ChangeResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ChangeResult::Rejected { .. })
    }
}
