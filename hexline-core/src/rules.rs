//! Rule tables: unit types, terrain and damage distributions

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::combat::{CombatTable, DamageDistribution, DamageRange};
use crate::error::RulesError;
use crate::terrain::{TerrainRules, TerrainType, IMPASSABLE};
use crate::units::{UnitCatalog, UnitType, UnitTypeId};

/// Built-in unit type ids
pub mod unit_ids {
    use crate::units::UnitTypeId;

    pub const INFANTRY: UnitTypeId = 0;
    pub const TANK: UnitTypeId = 1;
    pub const ARTILLERY: UnitTypeId = 2;
}

/// Built-in terrain ids
pub mod terrain_ids {
    use crate::terrain::TerrainId;

    pub const PLAINS: TerrainId = 0;
    pub const FOREST: TerrainId = 1;
    pub const MOUNTAIN: TerrainId = 2;
    pub const WATER: TerrainId = 3;
    pub const CITY: TerrainId = 4;
    pub const BASE: TerrainId = 5;
}

/// A complete rule set
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rules {
    pub name: String,
    pub units: UnitCatalog,
    pub terrain: TerrainRules,
    pub combat: CombatTable,
}

impl Rules {
    pub fn new(name: &str, units: UnitCatalog, terrain: TerrainRules, combat: CombatTable) -> Self {
        Self {
            name: name.to_string(),
            units,
            terrain,
            combat,
        }
    }

    /// Load rules from a JSON file and check them
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rules: Rules = serde_json::from_str(&content)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Save rules to a JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check cross references and damage tables
    pub fn validate(&self) -> Result<(), RulesError> {
        for terrain in self.terrain.types() {
            if terrain.movement_cost == 0 || terrain.cost_overrides.values().any(|&c| c == 0) {
                return Err(RulesError::ZeroMovementCost(terrain.id));
            }
            for &unit_type in &terrain.buildable {
                self.require_unit(unit_type, || format!("terrain {} build list", terrain.name))?;
            }
            for &unit_type in terrain.cost_overrides.keys() {
                self.require_unit(unit_type, || format!("terrain {} cost override", terrain.name))?;
            }
        }
        for matchup in self.combat.matchups() {
            self.require_unit(matchup.attacker, || "damage table attacker".to_string())?;
            self.require_unit(matchup.defender, || "damage table defender".to_string())?;
            matchup.damage.validate(matchup.attacker, matchup.defender)?;
        }
        Ok(())
    }

    fn require_unit(&self, unit_type: UnitTypeId, context: impl FnOnce() -> String) -> Result<(), RulesError> {
        if self.units.contains(unit_type) {
            Ok(())
        } else {
            Err(RulesError::UnknownUnitType {
                unit_type,
                context: context(),
            })
        }
    }
}

impl Default for Rules {
    fn default() -> Self {
        use terrain_ids::*;
        use unit_ids::*;

        let units = UnitCatalog::from_types([
            UnitType::new(INFANTRY, "Infantry", 100, 3, 1).capturing().with_cost(75),
            UnitType::new(TANK, "Tank", 100, 5, 1).with_cost(200),
            UnitType::new(ARTILLERY, "Artillery", 100, 2, 3).with_cost(150),
        ]);

        let all = [INFANTRY, TANK, ARTILLERY];
        let terrain = TerrainRules::from_types([
            TerrainType::new(PLAINS, "Plains", 1, 0),
            TerrainType::new(FOREST, "Forest", 2, 10).with_override(TANK, 3),
            TerrainType::new(MOUNTAIN, "Mountain", 3, 20).with_override(TANK, IMPASSABLE),
            TerrainType::new(WATER, "Water", IMPASSABLE, 0),
            TerrainType::new(CITY, "City", 1, 15).capturable().with_income(100).with_heal(20),
            TerrainType::new(BASE, "Base", 1, 15)
                .capturable()
                .with_buildable(&all)
                .with_income(100)
                .with_heal(20),
        ]);

        // (attacker, defender, bands)
        let table: [(UnitTypeId, UnitTypeId, &[DamageRange]); 9] = [
            (INFANTRY, INFANTRY, &[DamageRange::new(20, 35, 3), DamageRange::new(36, 50, 1)]),
            (INFANTRY, TANK, &[DamageRange::new(5, 15, 1)]),
            (INFANTRY, ARTILLERY, &[DamageRange::new(30, 45, 1)]),
            (TANK, INFANTRY, &[DamageRange::new(40, 60, 3), DamageRange::new(61, 80, 1)]),
            (TANK, TANK, &[DamageRange::new(25, 45, 1)]),
            (TANK, ARTILLERY, &[DamageRange::new(45, 65, 1)]),
            (ARTILLERY, INFANTRY, &[DamageRange::new(35, 55, 1)]),
            (ARTILLERY, TANK, &[DamageRange::new(30, 50, 1)]),
            (ARTILLERY, ARTILLERY, &[DamageRange::new(25, 40, 1)]),
        ];
        let mut combat = CombatTable::new();
        for (attacker, defender, bands) in table {
            combat.insert(attacker, defender, DamageDistribution::new(bands.to_vec()));
        }

        Rules::new("default", units, terrain, combat)
    }
}
