//! Hex grid geometry with axial coordinates

use serde::{Deserialize, Serialize};

/// Axial hex coordinates. The third cube axis is derived: `s = -q - r`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AxialCoord {
    pub q: i32,
    pub r: i32,
}

impl AxialCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Packed map key for this coordinate
    pub fn key(&self) -> CoordKey {
        CoordKey::from(*self)
    }

    /// Distance between two hexes
    pub fn distance_to(&self, other: AxialCoord) -> u32 {
        distance(*self, other)
    }

    /// Get neighbor in direction (0-5), see [`DIRECTIONS`]
    pub fn neighbor(&self, direction: u8) -> AxialCoord {
        let (dq, dr) = DIRECTIONS[direction as usize % 6];
        AxialCoord::new(self.q + dq, self.r + dr)
    }

    /// All six neighbors in clockwise order starting east
    pub fn neighbors(&self) -> [AxialCoord; 6] {
        let mut out = [*self; 6];
        for (dir, slot) in out.iter_mut().enumerate() {
            *slot = self.neighbor(dir as u8);
        }
        out
    }

    /// Every hex within `radius` of this one, including itself
    pub fn range(&self, radius: u32) -> Vec<AxialCoord> {
        let radius = radius as i32;
        let mut out = Vec::new();
        for dq in -radius..=radius {
            let r_min = (-radius).max(-dq - radius);
            let r_max = radius.min(-dq + radius);
            for dr in r_min..=r_max {
                out.push(AxialCoord::new(self.q + dq, self.r + dr));
            }
        }
        out
    }

    /// Hexes at exactly `radius` from this one
    pub fn ring(&self, radius: u32) -> Vec<AxialCoord> {
        if radius == 0 {
            return vec![*self];
        }
        let radius = radius as i32;
        let mut out = Vec::with_capacity(6 * radius as usize);
        for side in 0..6 {
            // Corner of this side, then walk along the edge
            let (cq, cr) = DIRECTIONS[(side + 4) % 6];
            let (dq, dr) = DIRECTIONS[side];
            for step in 0..radius {
                out.push(AxialCoord::new(
                    self.q + radius * cq + step * dq,
                    self.r + radius * cr + step * dr,
                ));
            }
        }
        out
    }
}

impl std::fmt::Display for AxialCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// Hex distance: `(|dq| + |dq + dr| + |dr|) / 2`, taken in `i64` and
/// saturated at `u32::MAX` so far-off coordinates cannot overflow
pub fn distance(a: AxialCoord, b: AxialCoord) -> u32 {
    let dq = i64::from(a.q) - i64::from(b.q);
    let dr = i64::from(a.r) - i64::from(b.r);
    let d = (dq.abs() + (dq + dr).abs() + dr.abs()) / 2;
    u32::try_from(d).unwrap_or(u32::MAX)
}

/// Direction vectors in axial coordinates (dq, dr), clockwise.
/// Index: 0=E, 1=SE, 2=SW, 3=W, 4=NW, 5=NE
pub const DIRECTIONS: [(i32, i32); 6] = [
    (1, 0),   // E
    (0, 1),   // SE
    (-1, 1),  // SW
    (-1, 0),  // W
    (0, -1),  // NW
    (1, -1),  // NE
];

/// Both axial components packed into one integer: q in the high half, r in the low half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey(u64);

impl CoordKey {
    pub fn coord(self) -> AxialCoord {
        AxialCoord::new((self.0 >> 32) as u32 as i32, self.0 as u32 as i32)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<AxialCoord> for CoordKey {
    fn from(c: AxialCoord) -> Self {
        CoordKey(((c.q as u32 as u64) << 32) | c.r as u32 as u64)
    }
}

/// Map extents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Bounds {
    /// Hexagonal map centred on the origin
    Hexagon { radius: u32 },
    /// Inclusive axial rectangle
    Rect {
        min_q: i32,
        max_q: i32,
        min_r: i32,
        max_r: i32,
    },
}

impl Bounds {
    pub const fn from_radius(radius: u32) -> Self {
        Bounds::Hexagon { radius }
    }

    pub const fn rect(min_q: i32, max_q: i32, min_r: i32, max_r: i32) -> Self {
        Bounds::Rect { min_q, max_q, min_r, max_r }
    }

    /// Check if a coordinate lies inside the map extents
    pub fn contains(&self, c: AxialCoord) -> bool {
        match *self {
            Bounds::Hexagon { radius } => {
                c.q.unsigned_abs() <= radius
                    && c.r.unsigned_abs() <= radius
                    && (i64::from(c.q) + i64::from(c.r)).unsigned_abs() <= u64::from(radius)
            }
            Bounds::Rect { min_q, max_q, min_r, max_r } => {
                (min_q..=max_q).contains(&c.q) && (min_r..=max_r).contains(&c.r)
            }
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::Hexagon { radius: 8 }
    }
}
