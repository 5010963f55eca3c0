//! Run driver: validate a config, decode the image, sequence the frames and
//! write the outputs.
//!
//! A run is all-or-nothing. Config and cell-size problems are caught before
//! anything touches the disk; a failure while writing removes whatever the
//! run had already written.

use image::{ImageFormat, RgbaImage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::animation::{AnimationAssembler, AnimationOutcome};
use crate::animation::DEFAULT_DELAY_MS;
use crate::grid::Orientation;
use crate::output::{check_encodable, resize_image, FrameWriter, OutputError, OutputNaming};
use crate::sequencer::{FrameSequencer, PassConfig, SizingMode};
use crate::transforms::{RotateMode, TransformError};
use crate::wire::RunResult;

/// Errors that abort a run
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Malformed or contradictory options
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A cell size that doesn't fit the canvas even once
    #[error("cell size {cell_size} does not fit a {width}x{height} image with {orientation} cells")]
    InvalidCellSize { cell_size: u32, width: u32, height: u32, orientation: Orientation },

    /// The input bytes could not be decoded
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Writing a frame or the animation failed
    #[error("failed to write output: {0}")]
    Output(#[source] OutputError),

    /// The target encoding can't do what was asked of it
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A cell transform was handed invalid cells
    #[error(transparent)]
    Transform(TransformError),

    /// The run was cancelled between passes
    #[error("run cancelled")]
    Cancelled,
}

impl From<OutputError> for EngineError {
    fn from(e: OutputError) -> Self {
        if e.is_unsupported() {
            EngineError::UnsupportedFormat(e.to_string())
        } else {
            EngineError::Output(e)
        }
    }
}

impl From<TransformError> for EngineError {
    fn from(e: TransformError) -> Self {
        match e {
            TransformError::Codec(image::ImageError::Unsupported(u)) => {
                EngineError::UnsupportedFormat(u.to_string())
            }
            other => EngineError::Transform(other),
        }
    }
}

/// Cooperative cancellation flag checked between passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything one run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// First cell size; the starting point in auto mode
    pub cell_size: u32,
    /// Number of doubling passes when not in auto mode
    pub iterations: u32,
    /// Keep doubling until cells would exceed half the bounding dimension
    pub auto: bool,
    pub orientation: Orientation,
    pub rotate_mode: RotateMode,
    /// Swap random pairs of cells
    pub randomize: bool,
    /// Flatten cells to their mean color (suppresses rotation)
    pub average: bool,
    /// Save every frame, not only single-frame results
    pub save_all_frames: bool,
    /// Encode the looping GIF
    pub produce_animation: bool,
    pub output: OutputNaming,
    /// Seed for rotation picks and swap shuffles; entropy when `None`
    pub rng_seed: Option<u64>,
    /// Resize to `(w, h)` before cutting; a zero side keeps the aspect ratio
    pub resize: Option<(u32, u32)>,
    pub frame_delay_ms: u32,
}

impl RunConfig {
    /// Defaults matching the command-line tool: one pass, no transforms.
    pub fn new(output: OutputNaming) -> Self {
        Self {
            cell_size: 0,
            iterations: 1,
            auto: false,
            orientation: Orientation::Square,
            rotate_mode: RotateMode::None,
            randomize: false,
            average: false,
            save_all_frames: false,
            produce_animation: true,
            output,
            rng_seed: None,
            resize: None,
            frame_delay_ms: DEFAULT_DELAY_MS,
        }
    }

    /// Reject option combinations that can't produce a meaningful run.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.auto && self.iterations > 0 && self.cell_size == 0 {
            return Err(EngineError::Config(
                "a cell size of at least 1 is required unless auto mode is on".to_string(),
            ));
        }
        if self.rotate_mode == RotateMode::NinetyMultiples && self.orientation != Orientation::Square {
            return Err(EngineError::Config(format!(
                "90° rotations need square cells, not {} strips",
                self.orientation
            )));
        }
        if self.save_all_frames && !self.output.pattern_has_size() {
            return Err(EngineError::Config(format!(
                "frame pattern '{}' has no {{size}} placeholder, frames would overwrite each other",
                self.output.frame_pattern
            )));
        }
        if self.output.basename.is_empty() {
            return Err(EngineError::Config("output basename is empty".to_string()));
        }
        Ok(())
    }

    fn sizing(&self) -> SizingMode {
        if self.auto {
            SizingMode::Auto { start: self.cell_size }
        } else {
            SizingMode::Explicit { start: self.cell_size, count: self.iterations }
        }
    }
}

/// Process one image and write its frames and animation.
pub fn run(image_bytes: &[u8], config: &RunConfig) -> Result<RunResult, EngineError> {
    run_with_cancel(image_bytes, config, None)
}

/// Read `path` and process it.
pub fn run_file(path: &Path, config: &RunConfig) -> Result<RunResult, EngineError> {
    let bytes = std::fs::read(path).map_err(|e| EngineError::Decode(image::ImageError::IoError(e)))?;
    run(&bytes, config)
}

/// Decode `image_bytes` and apply the configured resize.
pub fn decode(image_bytes: &[u8], resize: Option<(u32, u32)>) -> Result<RgbaImage, EngineError> {
    let image = image::load_from_memory(image_bytes).map_err(EngineError::Decode)?.to_rgba8();
    Ok(match resize {
        Some(target) => {
            let resized = resize_image(image, target);
            info!("Resized image to ({}, {})", resized.width(), resized.height());
            resized
        }
        None => image,
    })
}

/// [`run`] with a cancellation token checked between passes.
pub fn run_with_cancel(
    image_bytes: &[u8],
    config: &RunConfig,
    cancel: Option<CancelToken>,
) -> Result<RunResult, EngineError> {
    config.validate()?;

    let native_format = image::guess_format(image_bytes).ok();
    let source = decode(image_bytes, config.resize)?;
    let frame_format = config.output.frame_format().or(native_format).unwrap_or(ImageFormat::Png);

    let rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let pass = PassConfig {
        orientation: config.orientation,
        rotations: config.rotate_mode.options(),
        randomize: config.randomize,
        average: config.average,
        native_format,
    };
    let mut sequencer = FrameSequencer::new(&source, config.sizing(), pass, rng);
    if let Some(token) = cancel {
        sequencer = sequencer.with_cancel(token);
    }

    let size_count = sequencer.size()?.len();
    // A lone frame is the result itself: always saved, never animated
    let save_frames = config.save_all_frames || size_count == 1;
    let animate = config.produce_animation && size_count > 1;

    if save_frames {
        ensure_writable(frame_format)?;
    }
    if config.randomize {
        if let Some(native) = native_format {
            ensure_writable(native)?;
        }
    }

    let mut writer = save_frames.then(|| FrameWriter::new(config.output.clone(), frame_format));
    let frames = match sequencer.run(writer.as_mut()) {
        Ok(frames) => frames,
        Err(e) => {
            rollback(writer);
            return Err(e);
        }
    };

    let mut animation_path = None;
    if animate {
        let name = config.output.animation_name();
        let path = config.output.dir.join(&name);
        let assembler = AnimationAssembler::new(config.frame_delay_ms);
        match assembler.write(&frames, &path) {
            Ok(AnimationOutcome::Written(_)) => animation_path = Some(name),
            Ok(AnimationOutcome::NoFrames) => {}
            Err(e) => {
                if path.exists() {
                    if let Err(remove_err) = std::fs::remove_file(&path) {
                        warn!("Failed to remove partial animation {}: {}", path.display(), remove_err);
                    }
                }
                rollback(writer);
                return Err(e.into());
            }
        }
    }

    let frame_paths = writer.map(FrameWriter::finish).unwrap_or_default();
    info!(
        "Finished {}: {} frames, animation {}",
        config.output.basename,
        frames.len(),
        animation_path.as_deref().unwrap_or("none")
    );
    Ok(RunResult { animation_path, frame_paths })
}

/// Fail with `UnsupportedFormat` unless RGBA frames can be encoded as `format`.
fn ensure_writable(format: ImageFormat) -> Result<(), EngineError> {
    check_encodable(format).map_err(|e| EngineError::UnsupportedFormat(format!("{:?}: {}", format, e)))
}

fn rollback(writer: Option<FrameWriter>) {
    if let Some(writer) = writer {
        if !writer.names().is_empty() {
            warn!("Run failed, removing {} saved frames", writer.names().len());
        }
        writer.rollback();
    }
}
