//! Combat resolution
//!
//! Damage is sampled from a weighted set of ranges per (attacker type,
//! defender type), scaled by the attacker's health ratio and reduced by the
//! defender's terrain bonus. All arithmetic is integer so every peer samples
//! the same values from the same RNG stream.

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::units::{UnitType, UnitTypeId};
use crate::world::Unit;

/// Floor for any successful hit, and the fallback when a matchup has no data
pub const MIN_DAMAGE: u32 = 1;

// ============================================================================
// DISTRIBUTIONS
// ============================================================================

/// Inclusive damage band chosen with relative `weight`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRange {
    pub min: u32,
    pub max: u32,
    pub weight: u32,
}

impl DamageRange {
    pub const fn new(min: u32, max: u32, weight: u32) -> Self {
        Self { min, max, weight }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageDistribution {
    pub ranges: Vec<DamageRange>,
}

impl DamageDistribution {
    pub fn new(ranges: Vec<DamageRange>) -> Self {
        Self { ranges }
    }

    /// A single band with every value equally likely
    pub fn uniform(min: u32, max: u32) -> Self {
        Self::new(vec![DamageRange::new(min, max, 1)])
    }

    pub fn total_weight(&self) -> u64 {
        self.ranges.iter().map(|r| r.weight as u64).sum()
    }

    /// Smallest value a weighted band can produce
    pub fn min_damage(&self) -> u32 {
        self.weighted().map(|r| r.min).min().unwrap_or(0)
    }

    /// Largest value a weighted band can produce
    pub fn max_damage(&self) -> u32 {
        self.weighted().map(|r| r.max).max().unwrap_or(0)
    }

    /// Mean of the distribution, for previews
    pub fn expected_damage(&self) -> f64 {
        let total = self.total_weight();
        if total == 0 {
            return 0.0;
        }
        self.weighted()
            .map(|r| (r.min as f64 + r.max as f64) / 2.0 * r.weight as f64)
            .sum::<f64>()
            / total as f64
    }

    /// Pick a band by weight, then a value within it
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let total = self.total_weight();
        if total == 0 {
            return self.min_damage();
        }
        let mut roll = rng.gen_range(0..total);
        for band in self.weighted() {
            if roll < band.weight as u64 {
                let (lo, hi) = (band.min.min(band.max), band.min.max(band.max));
                return rng.gen_range(lo..=hi);
            }
            roll -= band.weight as u64;
        }
        self.max_damage()
    }

    pub fn validate(&self, attacker: UnitTypeId, defender: UnitTypeId) -> Result<(), RulesError> {
        if self.total_weight() == 0 {
            return Err(RulesError::EmptyDistribution { attacker, defender });
        }
        if let Some(band) = self.ranges.iter().find(|r| r.min > r.max) {
            return Err(RulesError::InvertedRange {
                attacker,
                defender,
                min: band.min,
                max: band.max,
            });
        }
        Ok(())
    }

    fn weighted(&self) -> impl Iterator<Item = &DamageRange> {
        self.ranges.iter().filter(|r| r.weight > 0)
    }
}

// ============================================================================
// DAMAGE TABLE
// ============================================================================

/// Damage distribution for one attacker/defender type pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub attacker: UnitTypeId,
    pub defender: UnitTypeId,
    pub damage: DamageDistribution,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Matchup>", into = "Vec<Matchup>")]
pub struct CombatTable {
    matchups: FxHashMap<(UnitTypeId, UnitTypeId), DamageDistribution>,
}

impl CombatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attacker: UnitTypeId, defender: UnitTypeId, damage: DamageDistribution) {
        self.matchups.insert((attacker, defender), damage);
    }

    pub fn with(mut self, attacker: UnitTypeId, defender: UnitTypeId, damage: DamageDistribution) -> Self {
        self.insert(attacker, defender, damage);
        self
    }

    pub fn get(&self, attacker: UnitTypeId, defender: UnitTypeId) -> Option<&DamageDistribution> {
        self.matchups.get(&(attacker, defender))
    }

    pub fn len(&self) -> usize {
        self.matchups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchups.is_empty()
    }

    /// All matchups sorted by (attacker, defender)
    pub fn matchups(&self) -> Vec<Matchup> {
        let mut out: Vec<Matchup> = self
            .matchups
            .iter()
            .map(|(&(attacker, defender), damage)| Matchup {
                attacker,
                defender,
                damage: damage.clone(),
            })
            .collect();
        out.sort_by_key(|m| (m.attacker, m.defender));
        out
    }
}

impl TryFrom<Vec<Matchup>> for CombatTable {
    type Error = RulesError;

    fn try_from(matchups: Vec<Matchup>) -> Result<Self, Self::Error> {
        let mut table = CombatTable::new();
        for m in matchups {
            if table.get(m.attacker, m.defender).is_some() {
                return Err(RulesError::DuplicateMatchup {
                    attacker: m.attacker,
                    defender: m.defender,
                });
            }
            table.insert(m.attacker, m.defender, m.damage);
        }
        Ok(table)
    }
}

impl From<CombatTable> for Vec<Matchup> {
    fn from(table: CombatTable) -> Self {
        table.matchups()
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// One side of a fight as seen by the resolver
#[derive(Clone, Copy, Debug)]
pub struct Combatant<'a> {
    pub unit: &'a Unit,
    pub unit_type: &'a UnitType,
    /// Defense bonus of the tile the unit stands on
    pub defense_bonus: u32,
}

/// Damage dealt by one hit and the target's health afterwards
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strike {
    pub damage: u32,
    pub remaining_health: u32,
}

impl Strike {
    pub fn is_lethal(&self) -> bool {
        self.remaining_health == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombatOutcome {
    pub attack: Strike,
    /// Present when the defender survived and could reach the attacker
    pub counter: Option<Strike>,
}

pub struct CombatResolver<'r> {
    table: &'r CombatTable,
}

impl<'r> CombatResolver<'r> {
    pub fn new(table: &'r CombatTable) -> Self {
        Self { table }
    }

    /// Resolve an attack and, if the defender survives in range, its counter
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        attacker: Combatant<'_>,
        defender: Combatant<'_>,
        distance: u32,
        rng: &mut R,
    ) -> CombatOutcome {
        let damage = self.damage(attacker, attacker.unit.health, defender, rng);
        let attack = Strike {
            damage,
            remaining_health: defender.unit.health.saturating_sub(damage),
        };

        let counter = if !attack.is_lethal() && defender.unit_type.in_range(distance) {
            let damage = self.damage(defender, attack.remaining_health, attacker, rng);
            Some(Strike {
                damage,
                remaining_health: attacker.unit.health.saturating_sub(damage),
            })
        } else {
            None
        };

        CombatOutcome { attack, counter }
    }

    /// Damage `striker` deals at `health` to `target`
    pub fn damage<R: Rng + ?Sized>(
        &self,
        striker: Combatant<'_>,
        health: u32,
        target: Combatant<'_>,
        rng: &mut R,
    ) -> u32 {
        let Some(distribution) = self.table.get(striker.unit.unit_type, target.unit.unit_type) else {
            tracing::warn!(
                "No damage table for unit type {} -> {}, using minimum damage",
                striker.unit.unit_type,
                target.unit.unit_type
            );
            return MIN_DAMAGE;
        };

        let base = distribution.sample(rng) as u64;
        let max_health = striker.unit_type.max_health.max(1) as u64;
        let health = (health as u64).min(max_health);
        let scaled = (base * health / max_health) as u32;

        scaled.saturating_sub(target.defense_bonus).max(MIN_DAMAGE)
    }
}
