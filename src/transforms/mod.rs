//! Cell transforms applied to a partitioned pixel buffer
//!
//! # Module Structure
//!
//! - [`types`] - Rotation amounts, rotate modes and error definitions
//! - [`apply`] - Rotate, swap and average passes over a set of cells

pub mod apply;
pub mod types;

pub use apply::{average_cells, extract_region, mean_color, paste_region, rotate_cells, round_trip, swap_cells};
pub use types::{RotateMode, Rotation, TransformError};

/// Result type alias for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;
