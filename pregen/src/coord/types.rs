//! Coordinate type definitions

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when parsing coordinate strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// The string is not of the form `x,z`.
    #[error("Invalid cell coordinate '{0}': expected 'x,z'")]
    Malformed(String),

    /// One of the components is not a valid 32-bit integer.
    #[error("Invalid cell coordinate '{input}': {reason}")]
    InvalidComponent { input: String, reason: String },
}

/// One generation cell in a region's plane.
///
/// Cells are addressed by integer `(x, z)` pairs. The type is a pure value:
/// two coordinates with the same components are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CellCoord {
    /// East-west cell index
    pub x: i32,
    /// North-south cell index
    pub z: i32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chebyshev (chessboard) distance to another cell.
    ///
    /// Computed in `i64` so cells at opposite ends of the `i32` range do not
    /// overflow.
    #[inline]
    pub fn chebyshev_distance(&self, other: &CellCoord) -> u64 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dz = (self.z as i64 - other.z as i64).unsigned_abs();
        dx.max(dz)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

impl FromStr for CellCoord {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, z) = s
            .split_once(',')
            .ok_or_else(|| CoordError::Malformed(s.to_string()))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|e| CoordError::InvalidComponent {
                    input: s.to_string(),
                    reason: e.to_string(),
                })
        };

        Ok(Self::new(parse(x)?, parse(z)?))
    }
}

impl From<(i32, i32)> for CellCoord {
    fn from((x, z): (i32, i32)) -> Self {
        Self::new(x, z)
    }
}

/// Identifier of a target region (a world or dimension managed by the host).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(String);

impl RegionId {
    /// Creates a region identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RegionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
