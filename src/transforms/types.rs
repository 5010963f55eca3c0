//! Core cell transform types and error definitions
//!
//! Contains the `Rotation` amounts a cell can be turned by, the `RotateMode`
//! families users pick from, and `TransformError` for failures while applying
//! a transform to a buffer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::grid::CellBox;

/// Errors that can occur while transforming cells
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransformError {
    /// Rotation was requested with nothing to choose from
    #[error("rotation requires at least one option")]
    NoRotationOptions,

    /// A quarter turn would change the shape of a non-square cell
    #[error("cannot rotate non-square cell {cell} by {degrees}°")]
    NonSquareRotation { cell: CellBox, degrees: u16 },

    /// Two cells of different sizes were paired for a swap
    #[error("cannot swap cells of different sizes: {first} and {second}")]
    MismatchedPair { first: CellBox, second: CellBox },

    /// A cell reaches outside the buffer
    #[error("cell {cell} lies outside a {width}x{height} buffer")]
    OutOfBounds { cell: CellBox, width: u32, height: u32 },

    /// Round-tripping a region through the native encoding failed
    #[error("region round-trip failed: {0}")]
    Codec(#[from] image::ImageError),
}

/// Clockwise rotation applied to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    None,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Quarter turns swap a region's width and height.
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Which rotations a run draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotateMode {
    /// Cells are left as they are
    #[default]
    None,
    /// Every cell is turned 180°
    Flip,
    /// Each cell gets a random multiple of 90° (square cells only)
    NinetyMultiples,
}

impl RotateMode {
    /// The options handed to the rotate pass. Empty means no rotate pass.
    pub fn options(self) -> Vec<Rotation> {
        match self {
            RotateMode::None => Vec::new(),
            RotateMode::Flip => vec![Rotation::Deg180],
            RotateMode::NinetyMultiples => {
                vec![Rotation::None, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270]
            }
        }
    }
}
