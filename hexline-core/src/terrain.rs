//! Terrain type definitions: movement cost and defense bonus lookup

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::units::UnitTypeId;

/// Terrain type identifier
pub type TerrainId = u16;

/// Movement cost sentinel for terrain no unit can enter
pub const IMPASSABLE: i32 = -1;

/// Terrain type definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainType {
    pub id: TerrainId,
    pub name: String,
    /// Cost to enter; negative means impassable
    pub movement_cost: i32,
    /// Flat reduction applied to damage taken by a unit standing here
    #[serde(default)]
    pub defense_bonus: u32,
    /// Units that can capture may take ownership of this tile
    #[serde(default)]
    pub capturable: bool,
    /// Unit types an owner can build here
    #[serde(default)]
    pub buildable: Vec<UnitTypeId>,
    /// Coins paid to the owner at the end of each of their turns
    #[serde(default)]
    pub income: u32,
    /// Health restored to a resting unit at its top-up
    #[serde(default)]
    pub heal: u32,
    /// Per unit-type movement cost, replacing `movement_cost`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cost_overrides: BTreeMap<UnitTypeId, i32>,
}

impl TerrainType {
    pub fn new(id: TerrainId, name: &str, movement_cost: i32, defense_bonus: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            movement_cost,
            defense_bonus,
            capturable: false,
            buildable: Vec::new(),
            income: 0,
            heal: 0,
            cost_overrides: BTreeMap::new(),
        }
    }

    pub fn capturable(mut self) -> Self {
        self.capturable = true;
        self
    }

    pub fn with_buildable(mut self, unit_types: &[UnitTypeId]) -> Self {
        self.buildable = unit_types.to_vec();
        self
    }

    pub fn with_income(mut self, income: u32) -> Self {
        self.income = income;
        self
    }

    pub fn with_heal(mut self, heal: u32) -> Self {
        self.heal = heal;
        self
    }

    pub fn with_override(mut self, unit_type: UnitTypeId, cost: i32) -> Self {
        self.cost_overrides.insert(unit_type, cost);
        self
    }

    /// Cost for a given unit type, `None` if impassable for it
    pub fn cost_for(&self, unit_type: UnitTypeId) -> Option<u32> {
        let cost = self
            .cost_overrides
            .get(&unit_type)
            .copied()
            .unwrap_or(self.movement_cost);
        (cost >= 0).then_some(cost as u32)
    }

    pub fn can_build(&self, unit_type: UnitTypeId) -> bool {
        self.buildable.contains(&unit_type)
    }
}

/// Indexed terrain table
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<TerrainType>", into = "Vec<TerrainType>")]
pub struct TerrainRules {
    terrains: FxHashMap<TerrainId, TerrainType>,
}

impl TerrainRules {
    /// Build from definitions; a later duplicate id replaces an earlier one
    pub fn from_types(types: impl IntoIterator<Item = TerrainType>) -> Self {
        Self {
            terrains: types.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn get(&self, id: TerrainId) -> Option<&TerrainType> {
        self.terrains.get(&id)
    }

    pub fn len(&self) -> usize {
        self.terrains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terrains.is_empty()
    }

    /// Definitions sorted by id
    pub fn types(&self) -> Vec<&TerrainType> {
        let mut out: Vec<_> = self.terrains.values().collect();
        out.sort_by_key(|t| t.id);
        out
    }

    /// Movement cost of entering `terrain` with `unit_type`; `None` if impassable or unknown
    pub fn movement_cost(&self, terrain: TerrainId, unit_type: UnitTypeId) -> Option<u32> {
        self.get(terrain).and_then(|t| t.cost_for(unit_type))
    }

    /// Base passability, ignoring per-unit overrides
    pub fn is_passable(&self, terrain: TerrainId) -> bool {
        self.get(terrain).is_some_and(|t| t.movement_cost >= 0)
    }

    pub fn defense_bonus(&self, terrain: TerrainId) -> u32 {
        self.get(terrain).map_or(0, |t| t.defense_bonus)
    }
}

impl TryFrom<Vec<TerrainType>> for TerrainRules {
    type Error = RulesError;

    fn try_from(types: Vec<TerrainType>) -> Result<Self, Self::Error> {
        let mut terrains = FxHashMap::default();
        for t in types {
            if t.movement_cost == 0 || t.cost_overrides.values().any(|&c| c == 0) {
                return Err(RulesError::ZeroMovementCost(t.id));
            }
            let id = t.id;
            if terrains.insert(id, t).is_some() {
                return Err(RulesError::DuplicateTerrain(id));
            }
        }
        Ok(Self { terrains })
    }
}

impl From<TerrainRules> for Vec<TerrainType> {
    fn from(rules: TerrainRules) -> Self {
        let mut out: Vec<_> = rules.terrains.into_values().collect();
        out.sort_by_key(|t| t.id);
        out
    }
}
