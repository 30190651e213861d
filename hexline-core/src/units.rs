//! Unit type definitions

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::RulesError;

/// Unit type identifier
pub type UnitTypeId = u16;

/// Unit type definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: String,
    pub max_health: u32,
    /// Movement points restored at each top-up
    pub movement: u32,
    /// Maximum attack distance; 0 means the unit cannot attack
    pub attack_range: u32,
    #[serde(default)]
    pub can_capture: bool,
    /// Coins spent to build one
    #[serde(default)]
    pub cost: u32,
}

impl UnitType {
    pub fn new(id: UnitTypeId, name: &str, max_health: u32, movement: u32, attack_range: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            max_health,
            movement,
            attack_range,
            can_capture: false,
            cost: 0,
        }
    }

    pub fn capturing(mut self) -> Self {
        self.can_capture = true;
        self
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn can_attack(&self) -> bool {
        self.attack_range > 0
    }

    /// Whether a target at `distance` is within reach
    pub fn in_range(&self, distance: u32) -> bool {
        distance >= 1 && distance <= self.attack_range
    }
}

/// Indexed unit type table
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<UnitType>", into = "Vec<UnitType>")]
pub struct UnitCatalog {
    types: FxHashMap<UnitTypeId, UnitType>,
}

impl UnitCatalog {
    /// Build from definitions; a later duplicate id replaces an earlier one
    pub fn from_types(types: impl IntoIterator<Item = UnitType>) -> Self {
        Self {
            types: types.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn get(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.types.get(&id)
    }

    pub fn contains(&self, id: UnitTypeId) -> bool {
        self.types.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up a type by its display name
    pub fn by_name(&self, name: &str) -> Option<&UnitType> {
        self.types.values().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

impl TryFrom<Vec<UnitType>> for UnitCatalog {
    type Error = RulesError;

    fn try_from(types: Vec<UnitType>) -> Result<Self, Self::Error> {
        let mut map = FxHashMap::default();
        for t in types {
            if t.max_health == 0 {
                return Err(RulesError::ZeroHealth(t.id));
            }
            let id = t.id;
            if map.insert(id, t).is_some() {
                return Err(RulesError::DuplicateUnitType(id));
            }
        }
        Ok(Self { types: map })
    }
}

impl From<UnitCatalog> for Vec<UnitType> {
    fn from(catalog: UnitCatalog) -> Self {
        let mut out: Vec<_> = catalog.types.into_values().collect();
        out.sort_by_key(|t| t.id);
        out
    }
}
