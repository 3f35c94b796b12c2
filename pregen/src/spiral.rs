//! Outward square-spiral enumeration of cells around a center.
//!
//! The walk starts at the center, heads along +x and turns 90° clockwise at
//! the end of every leg. Leg lengths grow by one every two legs
//! (1, 1, 2, 2, 3, 3, ...), so each completed ring of radius `r` covers
//! exactly `(2r + 1)²` cells before the walk steps outside it.
//!
//! ```text
//!        x-1  x  x+1
//!  z-1    6   7   8
//!  z      5   0   1
//!  z+1    4   3   2
//! ```
//!
//! The full walk state is a handful of integers ([`SpiralState`]), which is
//! what makes a generation run resumable across restarts.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::coord::CellCoord;

/// Radius above which creating a spiral logs an advisory.
///
/// Cell count grows quadratically: a radius of 100,000 is already ~40 billion
/// cells.
pub const LARGE_RADIUS_ADVISORY: i32 = 100_000;

/// Errors raised when constructing or restoring a spiral.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpiralError {
    /// The radius is negative.
    #[error("Spiral radius must be non-negative, got {0}")]
    NegativeRadius(i32),

    /// The walk would leave the 32-bit coordinate space.
    #[error("Spiral radius {radius} around {center} overflows 32-bit cell coordinates")]
    RadiusOverflow { center: CellCoord, radius: i32 },

    /// A restored snapshot is internally inconsistent.
    #[error("Invalid spiral state: {0}")]
    InvalidState(String),
}

/// Serializable snapshot of a spiral walk.
///
/// Restoring from a snapshot continues at exactly the next untraversed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiralState {
    pub center_x: i32,
    pub center_z: i32,
    pub max_radius: i32,
    /// Current offset from the center.
    pub x: i32,
    pub z: i32,
    /// Current direction, always a unit axis vector.
    pub dx: i32,
    pub dz: i32,
    /// Steps already taken in the current leg.
    pub leg_steps: i32,
    /// Length of the current leg.
    pub leg_length: i32,
    /// Legs completed so far.
    pub legs_completed: u64,
}

/// Total number of cells covered by a spiral of the given radius.
///
/// `(2r + 1)²` in `u64`; 32-bit arithmetic overflows past a radius of
/// roughly 23,000.
pub fn total_cells(radius: i32) -> u64 {
    let side = 2 * radius.max(0) as u64 + 1;
    side * side
}

/// Resumable outward square-spiral iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiralIterator {
    center: CellCoord,
    max_radius: i32,
    x: i32,
    z: i32,
    dx: i32,
    dz: i32,
    leg_steps: i32,
    leg_length: i32,
    legs_completed: u64,
}

impl SpiralIterator {
    /// Creates a spiral around `center` covering every cell within
    /// Chebyshev distance `max_radius`.
    ///
    /// # Errors
    ///
    /// Returns [`SpiralError::NegativeRadius`] for a negative radius and
    /// [`SpiralError::RadiusOverflow`] when the walk would leave the `i32`
    /// coordinate space.
    pub fn new(center: CellCoord, max_radius: i32) -> Result<Self, SpiralError> {
        validate_radius(center, max_radius)?;

        if max_radius > LARGE_RADIUS_ADVISORY {
            warn!(
                radius = max_radius,
                total_cells = total_cells(max_radius),
                "Very large generation radius; the run will take a long time"
            );
        }

        Ok(Self {
            center,
            max_radius,
            x: 0,
            z: 0,
            dx: 1,
            dz: 0,
            leg_steps: 0,
            leg_length: 1,
            legs_completed: 0,
        })
    }

    /// Restores a spiral from a snapshot taken with [`SpiralIterator::state`].
    pub fn from_state(state: SpiralState) -> Result<Self, SpiralError> {
        let center = CellCoord::new(state.center_x, state.center_z);
        validate_radius(center, state.max_radius)?;

        let unit_axis = matches!((state.dx, state.dz), (1, 0) | (0, 1) | (-1, 0) | (0, -1));
        if !unit_axis {
            return Err(SpiralError::InvalidState(format!(
                "direction ({}, {}) is not a unit axis vector",
                state.dx, state.dz
            )));
        }
        if state.leg_length < 1 {
            return Err(SpiralError::InvalidState(format!(
                "leg length {} must be at least 1",
                state.leg_length
            )));
        }
        if state.leg_steps < 0 || state.leg_steps >= state.leg_length {
            return Err(SpiralError::InvalidState(format!(
                "leg steps {} outside 0..{}",
                state.leg_steps, state.leg_length
            )));
        }
        let limit = state.max_radius as u32 + 1;
        if state.x.unsigned_abs() > limit || state.z.unsigned_abs() > limit {
            return Err(SpiralError::InvalidState(format!(
                "offset ({}, {}) lies beyond radius {}",
                state.x, state.z, state.max_radius
            )));
        }

        Ok(Self {
            center,
            max_radius: state.max_radius,
            x: state.x,
            z: state.z,
            dx: state.dx,
            dz: state.dz,
            leg_steps: state.leg_steps,
            leg_length: state.leg_length,
            legs_completed: state.legs_completed,
        })
    }

    /// Snapshot of the full walk state.
    pub fn state(&self) -> SpiralState {
        SpiralState {
            center_x: self.center.x,
            center_z: self.center.z,
            max_radius: self.max_radius,
            x: self.x,
            z: self.z,
            dx: self.dx,
            dz: self.dz,
            leg_steps: self.leg_steps,
            leg_length: self.leg_length,
            legs_completed: self.legs_completed,
        }
    }

    pub fn center(&self) -> CellCoord {
        self.center
    }

    pub fn max_radius(&self) -> i32 {
        self.max_radius
    }

    /// Number of cells the full walk covers.
    pub fn total_cells(&self) -> u64 {
        total_cells(self.max_radius)
    }

    /// Whether the current position still lies within the radius.
    #[inline]
    pub fn has_next(&self) -> bool {
        let radius = self.max_radius as u32;
        self.x.unsigned_abs() <= radius && self.z.unsigned_abs() <= radius
    }

    /// The cell the next call to [`Iterator::next`] would return, without
    /// advancing.
    pub fn peek(&self) -> Option<CellCoord> {
        if !self.has_next() {
            return None;
        }
        // Radius validation guarantees center + offset fits in i32.
        Some(CellCoord::new(self.center.x + self.x, self.center.z + self.z))
    }

    /// Moves one step along the spiral. Does nothing once exhausted.
    pub fn advance(&mut self) {
        if !self.has_next() {
            return;
        }

        self.x += self.dx;
        self.z += self.dz;
        self.leg_steps += 1;

        if self.leg_steps == self.leg_length {
            self.leg_steps = 0;
            (self.dx, self.dz) = (-self.dz, self.dx);
            self.legs_completed += 1;
            if self.legs_completed % 2 == 0 {
                self.leg_length += 1;
            }
        }
    }
}

impl Iterator for SpiralIterator {
    type Item = CellCoord;

    fn next(&mut self) -> Option<CellCoord> {
        let current = self.peek()?;
        self.advance();
        Some(current)
    }
}

/// The walk reaches one cell past the radius before stopping, and the longest
/// leg is `2r + 1`; both must stay inside `i32`.
fn validate_radius(center: CellCoord, radius: i32) -> Result<(), SpiralError> {
    if radius < 0 {
        return Err(SpiralError::NegativeRadius(radius));
    }

    let reach = radius as i64 + 1;
    let fits = |c: i32| {
        let c = c as i64;
        c - reach >= i32::MIN as i64 && c + reach <= i32::MAX as i64
    };
    let leg_fits = 2 * radius as i64 + 1 <= i32::MAX as i64;

    if !leg_fits || !fits(center.x) || !fits(center.z) {
        return Err(SpiralError::RadiusOverflow { center, radius });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn origin() -> CellCoord {
        CellCoord::new(0, 0)
    }

    #[test]
    fn test_first_cell_is_center() {
        let mut spiral = SpiralIterator::new(CellCoord::new(5, -3), 4).unwrap();
        assert_eq!(spiral.next(), Some(CellCoord::new(5, -3)));
    }

    #[test]
    fn test_radius_zero_yields_only_center() {
        let cells: Vec<_> = SpiralIterator::new(origin(), 0).unwrap().collect();
        assert_eq!(cells, vec![origin()]);
    }

    #[test]
    fn test_radius_one_order() {
        let cells: Vec<_> = SpiralIterator::new(origin(), 1).unwrap().collect();
        let expected: Vec<CellCoord> = [
            (0, 0),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
        ]
        .into_iter()
        .map(CellCoord::from)
        .collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_coverage_for_small_radii() {
        for radius in 0..=12 {
            let center = CellCoord::new(-7, 19);
            let cells: Vec<_> = SpiralIterator::new(center, radius).unwrap().collect();
            let unique: HashSet<_> = cells.iter().copied().collect();

            assert_eq!(cells.len() as u64, total_cells(radius), "radius {}", radius);
            assert_eq!(unique.len(), cells.len(), "duplicates at radius {}", radius);
            assert!(cells
                .iter()
                .all(|c| c.chebyshev_distance(&center) <= radius as u64));
        }
    }

    #[test]
    fn test_has_next_matches_exhaustion() {
        let mut spiral = SpiralIterator::new(origin(), 2).unwrap();
        let mut count = 0;
        while spiral.has_next() {
            assert!(spiral.next().is_some());
            count += 1;
        }
        assert_eq!(count, 25);
        assert_eq!(spiral.next(), None);
        assert_eq!(spiral.peek(), None);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut spiral = SpiralIterator::new(origin(), 3).unwrap();
        spiral.advance();
        let peeked = spiral.peek();
        assert_eq!(spiral.peek(), peeked);
        assert_eq!(spiral.next(), peeked);
    }

    #[test]
    fn test_advance_after_exhaustion_is_noop() {
        let mut spiral = SpiralIterator::new(origin(), 0).unwrap();
        spiral.advance();
        let exhausted = spiral.state();
        spiral.advance();
        assert_eq!(spiral.state(), exhausted);
    }

    #[test]
    fn test_resume_from_snapshot_matches_uninterrupted() {
        for split in [0usize, 1, 2, 7, 30, 80] {
            let mut original = SpiralIterator::new(CellCoord::new(100, -40), 5).unwrap();
            for _ in 0..split {
                original.next();
            }

            let mut restored = SpiralIterator::from_state(original.state()).unwrap();
            let rest_original: Vec<_> = original.collect();
            let rest_restored: Vec<_> = restored.by_ref().collect();
            assert_eq!(rest_original, rest_restored, "split at {}", split);
        }
    }

    #[test]
    fn test_state_survives_json() {
        let mut spiral = SpiralIterator::new(CellCoord::new(3, 3), 9).unwrap();
        for _ in 0..17 {
            spiral.next();
        }
        let json = serde_json::to_string(&spiral.state()).unwrap();
        let state: SpiralState = serde_json::from_str(&json).unwrap();
        assert_eq!(SpiralIterator::from_state(state).unwrap(), spiral);
    }

    #[test]
    fn test_negative_radius_rejected() {
        assert_eq!(
            SpiralIterator::new(origin(), -1),
            Err(SpiralError::NegativeRadius(-1))
        );
    }

    #[test]
    fn test_overflowing_radius_rejected() {
        let center = CellCoord::new(i32::MAX - 10, 0);
        assert!(matches!(
            SpiralIterator::new(center, 10),
            Err(SpiralError::RadiusOverflow { .. })
        ));
        assert!(SpiralIterator::new(center, 9).is_ok());
        assert!(matches!(
            SpiralIterator::new(origin(), i32::MAX),
            Err(SpiralError::RadiusOverflow { .. })
        ));
    }

    #[test]
    fn test_total_cells_uses_wide_arithmetic() {
        assert_eq!(total_cells(0), 1);
        assert_eq!(total_cells(2), 25);
        // (2 * 50_000 + 1)² overflows u32
        assert_eq!(total_cells(50_000), 10_000_200_001);
    }

    #[test]
    fn test_from_state_rejects_bad_direction() {
        let mut state = SpiralIterator::new(origin(), 4).unwrap().state();
        state.dx = 1;
        state.dz = 1;
        assert!(matches!(
            SpiralIterator::from_state(state),
            Err(SpiralError::InvalidState(_))
        ));
    }

    #[test]
    fn test_from_state_rejects_bad_leg_counters() {
        let base = SpiralIterator::new(origin(), 4).unwrap().state();

        let mut zero_leg = base;
        zero_leg.leg_length = 0;
        assert!(SpiralIterator::from_state(zero_leg).is_err());

        let mut overshoot = base;
        overshoot.leg_steps = overshoot.leg_length;
        assert!(SpiralIterator::from_state(overshoot).is_err());
    }

    #[test]
    fn test_from_state_rejects_offset_beyond_radius() {
        let mut state = SpiralIterator::new(origin(), 4).unwrap().state();
        state.x = 6;
        assert!(SpiralIterator::from_state(state).is_err());
    }

    #[test]
    fn test_from_state_rejects_negative_radius() {
        let mut state = SpiralIterator::new(origin(), 4).unwrap().state();
        state.max_radius = -2;
        assert_eq!(
            SpiralIterator::from_state(state),
            Err(SpiralError::NegativeRadius(-2))
        );
    }
}
