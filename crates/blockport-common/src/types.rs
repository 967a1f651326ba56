use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Result<T> = std::result::Result<T, crate::error::BlockportError>;

/// Integer block position. Key of the output voxel map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoordinate {
    pub const ORIGIN: VoxelCoordinate = VoxelCoordinate { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        VoxelCoordinate { x, y, z }
    }

    pub fn offset(&self, other: VoxelCoordinate) -> Self {
        VoxelCoordinate {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

/// Formats as `x,y,z`, the key layout the editor store expects.
impl fmt::Display for VoxelCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

impl FromStr for VoxelCoordinate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected x,y,z but got '{}'", s));
        }
        let parse = |part: &str| {
            part.parse::<i32>()
                .map_err(|e| format!("invalid coordinate '{}': {}", part, e))
        };
        Ok(VoxelCoordinate::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

/// Inclusive axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: VoxelCoordinate,
    pub max: VoxelCoordinate,
}

impl Bounds {
    /// Builds a box from two corners in any order.
    pub fn new(a: VoxelCoordinate, b: VoxelCoordinate) -> Self {
        Bounds {
            min: VoxelCoordinate::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: VoxelCoordinate::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, c: VoxelCoordinate) -> bool {
        (self.min.x..=self.max.x).contains(&c.x)
            && (self.min.y..=self.max.y).contains(&c.y)
            && (self.min.z..=self.max.z).contains(&c.z)
    }
}

/// Parses `x1,y1,z1,x2,y2,z2`.
impl FromStr for Bounds {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid bounds '{}': {}", s, e))?;
        if values.len() != 6 {
            return Err(format!("expected 6 comma separated values but got {}", values.len()));
        }
        Ok(Bounds::new(
            VoxelCoordinate::new(values[0], values[1], values[2]),
            VoxelCoordinate::new(values[3], values[4], values[5]),
        ))
    }
}
