//! Animation assembly - normalize frames, loop them back and forth and
//! encode the result as an endlessly repeating GIF

use image::codecs::gif::{GifEncoder, Repeat};
use image::{imageops, Delay, Frame as GifFrame, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::output::{ensure_parent, OutputError};
use crate::sequencer::Frame;

/// Per-frame delay used when none is configured.
pub const DEFAULT_DELAY_MS: u32 = 100;

/// GIF delays are whole centiseconds; anything shorter rounds up to one.
fn frame_delay(delay_ms: u32) -> Delay {
    Delay::from_numer_denom_ms((delay_ms / 10).max(1) * 10, 1)
}

/// What the assembler did with a frame list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// The animation was encoded to this path
    Written(PathBuf),
    /// There were no frames, so nothing was encoded
    NoFrames,
}

/// Crop every frame, top-left aligned, to the smallest width and height found
/// across all of them.
pub fn normalize_frames(frames: &[Frame]) -> Vec<RgbaImage> {
    let Some(min_w) = frames.iter().map(|f| f.image.width()).min() else {
        return Vec::new();
    };
    let min_h = frames.iter().map(|f| f.image.height()).min().unwrap_or(0);

    frames
        .iter()
        .map(|f| {
            if f.image.dimensions() == (min_w, min_h) {
                f.image.clone()
            } else {
                imageops::crop_imm(&f.image, 0, 0, min_w, min_h).to_image()
            }
        })
        .collect()
}

/// Forward pass over all frames followed by the interior frames in reverse.
///
/// Given frames [A, B, C, D], produces [A, B, C, D, C, B]; played on a loop
/// the sequence bounces without repeating the end frames. The result has
/// `2N - 2` frames for `N >= 2` and `N` otherwise.
pub fn boustrophedon<T: Clone>(frames: &[T]) -> Vec<T> {
    let mut result = frames.to_vec();
    if frames.len() > 2 {
        result.extend(frames[1..frames.len() - 1].iter().rev().cloned());
    }
    result
}

/// Turns a run's frames into a looping GIF.
#[derive(Debug, Clone, Copy)]
pub struct AnimationAssembler {
    /// Delay between frames in milliseconds
    pub delay_ms: u32,
}

impl Default for AnimationAssembler {
    fn default() -> Self {
        Self { delay_ms: DEFAULT_DELAY_MS }
    }
}

impl AnimationAssembler {
    pub fn new(delay_ms: u32) -> Self {
        Self { delay_ms }
    }

    /// The normalized display sequence, ready for encoding.
    pub fn sequence(&self, frames: &[Frame]) -> Vec<RgbaImage> {
        boustrophedon(&normalize_frames(frames))
    }

    /// Encode `frames` as an endlessly looping GIF at `path`.
    pub fn write(&self, frames: &[Frame], path: &Path) -> Result<AnimationOutcome, OutputError> {
        if frames.is_empty() {
            info!("No frames produced, skipping animation");
            return Ok(AnimationOutcome::NoFrames);
        }
        let sequence = self.sequence(frames);
        let count = sequence.len();
        self.encode(sequence, path)?;
        info!("Wrote {}-frame animation {}", count, path.display());
        Ok(AnimationOutcome::Written(path.to_path_buf()))
    }

    fn encode(&self, sequence: Vec<RgbaImage>, path: &Path) -> Result<(), OutputError> {
        ensure_parent(path)?;
        let mut encoder = GifEncoder::new(BufWriter::new(File::create(path)?));
        encoder.set_repeat(Repeat::Infinite)?;
        let delay = frame_delay(self.delay_ms);
        encoder.encode_frames(sequence.into_iter().map(|image| GifFrame::from_parts(image, 0, 0, delay)))?;
        Ok(())
    }
}
