//! A* pathfinding and movement range on the hex grid
//!
//! Costs come from an injected function giving the cost of *entering* a hex,
//! or `None` when it cannot be entered. Step costs must be at least 1 for the
//! distance heuristic to stay admissible, and the cost function must return
//! `None` outside the map so searches terminate.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::error::PathError;
use crate::hex::AxialCoord;
use crate::terrain::TerrainRules;
use crate::units::UnitTypeId;
use crate::world::{PlayerId, World};

/// Node in the A* open set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathNode {
    coord: AxialCoord,
    g: u32,
    h: u32,
}

impl PathNode {
    fn f(&self) -> u32 {
        self.g.saturating_add(self.h)
    }
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap: lowest f, then lowest h, then coordinate
        other
            .f()
            .cmp(&self.f())
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest path from `start` to `goal`, both ends included
pub fn find_path<F>(start: AxialCoord, goal: AxialCoord, cost: F) -> Result<Vec<AxialCoord>, PathError>
where
    F: FnMut(AxialCoord) -> Option<u32>,
{
    find_path_within(start, goal, u32::MAX, cost)
}

/// Cheapest path whose total cost does not exceed `budget`
pub fn find_path_within<F>(
    start: AxialCoord,
    goal: AxialCoord,
    budget: u32,
    mut cost: F,
) -> Result<Vec<AxialCoord>, PathError>
where
    F: FnMut(AxialCoord) -> Option<u32>,
{
    if start == goal {
        return Ok(vec![start]);
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: FxHashMap<AxialCoord, AxialCoord> = FxHashMap::default();
    let mut g_scores: FxHashMap<AxialCoord, u32> = FxHashMap::default();

    g_scores.insert(start, 0);
    open_set.push(PathNode {
        coord: start,
        g: 0,
        h: start.distance_to(goal),
    });

    while let Some(current) = open_set.pop() {
        if current.coord == goal {
            return Ok(reconstruct_path(&came_from, goal));
        }

        // Stale entry superseded by a cheaper one
        if g_scores.get(&current.coord).is_some_and(|&g| current.g > g) {
            continue;
        }

        for neighbor in current.coord.neighbors() {
            let Some(step) = cost(neighbor) else {
                continue;
            };
            let tentative_g = current.g.saturating_add(step);
            if tentative_g > budget {
                continue;
            }
            if g_scores.get(&neighbor).map_or(true, |&g| tentative_g < g) {
                came_from.insert(neighbor, current.coord);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    coord: neighbor,
                    g: tentative_g,
                    h: neighbor.distance_to(goal),
                });
            }
        }
    }

    Err(PathError::NoPathFound { from: start, to: goal })
}

fn reconstruct_path(came_from: &FxHashMap<AxialCoord, AxialCoord>, mut current: AxialCoord) -> Vec<AxialCoord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Total cost of walking a path; the starting hex is free
pub fn path_cost<F>(path: &[AxialCoord], mut cost: F) -> Option<u32>
where
    F: FnMut(AxialCoord) -> Option<u32>,
{
    path.iter().skip(1).map(|&c| cost(c)).sum()
}

/// Every hex reachable from `start` within `budget`, with its cheapest cost
pub fn reachable<F>(start: AxialCoord, budget: u32, mut cost: F) -> FxHashMap<AxialCoord, u32>
where
    F: FnMut(AxialCoord) -> Option<u32>,
{
    let mut best: FxHashMap<AxialCoord, u32> = FxHashMap::default();
    let mut open_set = BinaryHeap::new();
    best.insert(start, 0);
    open_set.push(Reverse((0u32, start)));

    while let Some(Reverse((g, coord))) = open_set.pop() {
        if best.get(&coord).is_some_and(|&b| g > b) {
            continue;
        }
        for neighbor in coord.neighbors() {
            let Some(step) = cost(neighbor) else {
                continue;
            };
            let tentative = g.saturating_add(step);
            if tentative > budget {
                continue;
            }
            if best.get(&neighbor).map_or(true, |&b| tentative < b) {
                best.insert(neighbor, tentative);
                open_set.push(Reverse((tentative, neighbor)));
            }
        }
    }

    best
}

/// Whether any unit could enter `coord`: a tile exists and its terrain is not impassable
pub fn can_move_through(world: &World<'_>, terrain: &TerrainRules, coord: AxialCoord) -> bool {
    world
        .tile_at(coord)
        .is_some_and(|tile| terrain.is_passable(tile.terrain))
}

/// Entry cost for a unit of `unit_type` owned by `owner`: terrain cost, with
/// hexes held by other players' units blocked. Friendly units can be passed.
pub fn unit_movement_cost<'a>(
    world: &'a World<'a>,
    terrain: &'a TerrainRules,
    unit_type: UnitTypeId,
    owner: PlayerId,
) -> impl Fn(AxialCoord) -> Option<u32> + 'a {
    move |coord| {
        if world.unit_at(coord).is_some_and(|other| other.owner != owner) {
            return None;
        }
        world
            .tile_at(coord)
            .and_then(|tile| terrain.movement_cost(tile.terrain, unit_type))
    }
}
