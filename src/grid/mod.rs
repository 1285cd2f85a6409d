// Grid coordinates and the distance metric used for proposal scoring

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
mod tests;

/// A cell on the simulation grid.
///
/// Ordering is row-major, which gives every keyed collection of incidents a
/// stable iteration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: i32,
    pub col: i32,
}

impl Coordinate {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Chebyshev distance: diagonal moves cost the same as straight ones.
    pub fn distance(&self, other: &Coordinate) -> u32 {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        dr.max(dc)
    }

    /// Next cell on the way to `target`.
    ///
    /// Each axis moves by at most one, so a unit reaches any cell in exactly
    /// `distance` steps. Returns `self` when already at the target.
    pub fn step_toward(&self, target: &Coordinate) -> Coordinate {
        Coordinate {
            row: self.row + (target.row - self.row).signum(),
            col: self.col + (target.col - self.col).signum(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Bounds of the rectangular grid, origin at (0,0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub rows: u32,
    pub cols: u32,
}

impl GridBounds {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        c.row >= 0 && c.col >= 0 && (c.row as u32) < self.rows && (c.col as u32) < self.cols
    }

    pub fn cell_count(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }
}
