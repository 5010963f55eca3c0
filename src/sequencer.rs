//! Frame sequencing - one partition and transform pass per cell size
//!
//! The sequencer is a small state machine:
//!
//! ```text
//! Idle --size()--> Sizing --(sizes valid)--> Iterating --(last size)--> Done
//!                         \--(no sizes)------------------------------->/
//! ```
//!
//! Every pass starts from the pristine source image, so frames don't
//! accumulate each other's changes and any one of them can be reproduced on
//! its own.

use image::{imageops, ImageFormat, RgbaImage};
use rand::Rng;
use tracing::info;

use crate::engine::{CancelToken, EngineError};
use crate::grid::{partition, Orientation};
use crate::output::FrameWriter;
use crate::transforms::{average_cells, rotate_cells, swap_cells, Rotation};

/// One processed snapshot of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Cell size the frame was produced with
    pub cell_size: u32,
    pub image: RgbaImage,
}

/// How the list of cell sizes is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    /// `count` sizes starting at `start`, doubling each time
    Explicit { start: u32, count: u32 },
    /// Start at `start` (at least 1) and keep doubling while twice the size
    /// still fits the bounding dimension
    Auto { start: u32 },
}

/// Compute the doubling sequence of cell sizes.
///
/// `bound` is the canvas dimension that limits the cells; only auto mode
/// looks at it.
pub fn cell_sizes(mode: SizingMode, bound: u32) -> Result<Vec<u32>, EngineError> {
    match mode {
        SizingMode::Explicit { start, count } => {
            if count > 0 && start == 0 {
                return Err(EngineError::Config("explicit cell size must be at least 1".to_string()));
            }
            let mut sizes = Vec::with_capacity(count as usize);
            let mut size = start;
            for i in 0..count {
                sizes.push(size);
                if i + 1 < count {
                    size = size.checked_mul(2).ok_or_else(|| {
                        EngineError::Config(format!("cell size overflows after {} doublings of {}", i + 1, start))
                    })?;
                }
            }
            Ok(sizes)
        }
        SizingMode::Auto { start } => {
            let mut sizes = Vec::new();
            let mut size = start.max(1) as u64;
            while size * 2 <= bound as u64 {
                sizes.push(size as u32);
                size *= 2;
            }
            Ok(sizes)
        }
    }
}

/// What a single pass does to its cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassConfig {
    pub orientation: Orientation,
    /// Rotation options; empty disables the rotate step
    pub rotations: Vec<Rotation>,
    /// Swap random pairs of cells after rotating or averaging
    pub randomize: bool,
    /// Flatten each cell to its mean color; suppresses rotation
    pub average: bool,
    /// The source's own encoding, used to round-trip swapped regions
    pub native_format: Option<ImageFormat>,
}

/// Where the sequencer is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Sizing,
    Iterating { next: usize },
    Done,
}

/// Drives partition and transform passes across a cell-size sequence.
pub struct FrameSequencer<'a, R: Rng> {
    source: &'a RgbaImage,
    sizing: SizingMode,
    pass: PassConfig,
    rng: R,
    cancel: Option<CancelToken>,
    sizes: Vec<u32>,
    state: SequencerState,
}

impl<'a, R: Rng> FrameSequencer<'a, R> {
    pub fn new(source: &'a RgbaImage, sizing: SizingMode, pass: PassConfig, rng: R) -> Self {
        Self { source, sizing, pass, rng, cancel: None, sizes: Vec::new(), state: SequencerState::Idle }
    }

    /// Check `token` between passes and stop with `Cancelled` once it fires.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// The cell sizes of this run; empty until sizing has happened.
    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Work out the cell sizes and check every one of them against the canvas.
    ///
    /// Runs at most once. An empty sequence moves straight to `Done`. A size
    /// that doesn't fit the canvas fails here, before any pass has run.
    pub fn size(&mut self) -> Result<&[u32], EngineError> {
        if self.state != SequencerState::Idle {
            return Ok(&self.sizes);
        }
        self.state = SequencerState::Sizing;

        let (width, height) = self.source.dimensions();
        let bound = self.pass.orientation.bound_dimension(width, height);
        let sizes = match cell_sizes(self.sizing, bound) {
            Ok(sizes) => sizes,
            Err(e) => {
                self.state = SequencerState::Done;
                return Err(e);
            }
        };
        if let Some(&bad) = sizes.iter().find(|&&cs| cs > bound) {
            self.state = SequencerState::Done;
            return Err(EngineError::InvalidCellSize {
                cell_size: bad,
                width,
                height,
                orientation: self.pass.orientation,
            });
        }

        info!("Cell sizes for {}x{} ({}): {:?}", width, height, self.pass.orientation, sizes);
        self.state = if sizes.is_empty() { SequencerState::Done } else { SequencerState::Iterating { next: 0 } };
        self.sizes = sizes;
        Ok(&self.sizes)
    }

    /// Run the next pass, or return `None` once every size has been done.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, EngineError> {
        if self.state == SequencerState::Idle {
            self.size()?;
        }
        let next = match self.state {
            SequencerState::Iterating { next } => next,
            _ => return Ok(None),
        };
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.state = SequencerState::Done;
            return Err(EngineError::Cancelled);
        }

        let cell_size = self.sizes[next];
        let frame = match self.run_pass(cell_size) {
            Ok(frame) => frame,
            Err(e) => {
                self.state = SequencerState::Done;
                return Err(e);
            }
        };
        self.state = if next + 1 < self.sizes.len() {
            SequencerState::Iterating { next: next + 1 }
        } else {
            SequencerState::Done
        };
        Ok(Some(frame))
    }

    /// Run every remaining pass, saving each frame through `writer` if given.
    pub fn run(mut self, mut writer: Option<&mut FrameWriter>) -> Result<Vec<Frame>, EngineError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            if let Some(writer) = writer.as_deref_mut() {
                writer.write(&frame.image, frame.cell_size)?;
            }
            frames.push(frame);
        }
        Ok(frames)
    }

    fn run_pass(&mut self, cell_size: u32) -> Result<Frame, EngineError> {
        let (width, height) = self.source.dimensions();
        let orientation = self.pass.orientation;
        let cells = partition(width, height, cell_size, orientation);
        if cells.is_empty() {
            return Err(EngineError::InvalidCellSize { cell_size, width, height, orientation });
        }

        let mut buffer = self.source.clone();
        // 1x1 squares look the same rotated or averaged
        let unit_squares = cell_size == 1 && orientation == Orientation::Square;
        if !unit_squares {
            if self.pass.average {
                average_cells(&mut buffer, &cells.boxes)?;
            } else if !self.pass.rotations.is_empty() {
                rotate_cells(&mut buffer, &cells.boxes, &self.pass.rotations, &mut self.rng)?;
            }
        }
        if self.pass.randomize {
            swap_cells(&mut buffer, &cells.boxes, self.pass.native_format, &mut self.rng)?;
        }

        let image = if (cells.width, cells.height) == (width, height) {
            buffer
        } else {
            imageops::crop_imm(&buffer, 0, 0, cells.width, cells.height).to_image()
        };
        info!("Pass at cell size {}: {} cells, frame {}x{}", cell_size, cells.len(), cells.width, cells.height);
        Ok(Frame { cell_size, image })
    }
}
