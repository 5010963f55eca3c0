//! Grid partitioning of a canvas into cells
//!
//! A partition tiles the top-left `width × height` region of a canvas with
//! equally sized boxes. Whatever doesn't fit a whole cell along a partitioned
//! axis is cropped away by the caller after the pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the cells a canvas is cut into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// `cell_size × cell_size` squares, row-major
    #[default]
    Square,
    /// Full-height strips `cell_size` wide, left to right
    Vertical,
    /// Full-width strips `cell_size` tall, top to bottom
    Horizontal,
}

impl Orientation {
    /// The canvas dimension that limits how large a cell may grow.
    pub fn bound_dimension(self, width: u32, height: u32) -> u32 {
        match self {
            Orientation::Square => width.min(height),
            Orientation::Vertical => width,
            Orientation::Horizontal => height,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::Square => "square",
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
        };
        f.write_str(name)
    }
}

/// Axis-aligned pixel rectangle `[left, right) × [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CellBox {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_square(&self) -> bool {
        self.width() == self.height()
    }

    pub fn same_size(&self, other: &CellBox) -> bool {
        self.width() == other.width() && self.height() == other.height()
    }
}

impl fmt::Display for CellBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.left, self.top, self.right, self.bottom)
    }
}

/// Boxes covering a canvas plus the size the canvas is cropped to afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub boxes: Vec<CellBox>,
    pub width: u32,
    pub height: u32,
}

impl Partition {
    /// True when the cell size didn't fit the canvas even once.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }
}

/// Cut a `width × height` canvas into cells of `cell_size`.
///
/// A `cell_size` of zero yields the identity partition: one box covering the
/// whole canvas. If the cell size exceeds the partitioned dimension the
/// partition has no boxes and a zero crop size; callers must reject it rather
/// than crop to nothing.
pub fn partition(width: u32, height: u32, cell_size: u32, orientation: Orientation) -> Partition {
    if cell_size == 0 {
        return Partition { boxes: vec![CellBox::new(0, 0, width, height)], width, height };
    }

    let cs = cell_size;
    match orientation {
        Orientation::Square => {
            let n_rows = height / cs;
            let n_cols = width / cs;
            let mut boxes = Vec::with_capacity((n_rows * n_cols) as usize);
            for i in 0..n_rows {
                for j in 0..n_cols {
                    boxes.push(CellBox::new(j * cs, i * cs, (j + 1) * cs, (i + 1) * cs));
                }
            }
            Partition { boxes, width: n_cols * cs, height: n_rows * cs }
        }
        Orientation::Vertical => {
            let n_cols = width / cs;
            let boxes = (0..n_cols).map(|i| CellBox::new(i * cs, 0, (i + 1) * cs, height)).collect();
            Partition { boxes, width: n_cols * cs, height }
        }
        Orientation::Horizontal => {
            let n_rows = height / cs;
            let boxes = (0..n_rows).map(|i| CellBox::new(0, i * cs, width, (i + 1) * cs)).collect();
            Partition { boxes, width, height: n_rows * cs }
        }
    }
}
