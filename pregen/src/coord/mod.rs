//! Cell and region coordinates.
//!
//! A region's plane is addressed by integer [`CellCoord`] pairs. Cells are
//! the atomic unit of generation; a [`RegionId`] names the region they
//! belong to.

mod types;

pub use types::{CellCoord, CoordError, RegionId};

#[cfg(test)]
mod tests;
