//! Cell transform application
//!
//! Every function here mutates the buffer in place and keeps its dimensions.
//! Cropping to the partition size is left to the caller.

use image::{imageops, ImageFormat, Rgba, RgbaImage};
use rand::seq::SliceRandom;
use rand::Rng;
use std::io::Cursor;
use tracing::debug;

use super::types::{Rotation, TransformError};
use crate::grid::CellBox;
use crate::output::to_encodable;

/// Copy the pixels under `cell` into a new image.
pub fn extract_region(image: &RgbaImage, cell: &CellBox) -> RgbaImage {
    imageops::crop_imm(image, cell.left, cell.top, cell.width(), cell.height()).to_image()
}

/// Paste `region` with its top-left corner at the cell's origin.
pub fn paste_region(image: &mut RgbaImage, region: &RgbaImage, cell: &CellBox) {
    imageops::replace(image, region, cell.left as i64, cell.top as i64);
}

fn check_bounds(image: &RgbaImage, cells: &[CellBox]) -> Result<(), TransformError> {
    let (width, height) = image.dimensions();
    match cells.iter().find(|c| c.right > width || c.bottom > height) {
        Some(cell) => Err(TransformError::OutOfBounds { cell: *cell, width, height }),
        None => Ok(()),
    }
}

/// Rotate every cell by an amount drawn from `options`.
///
/// With a single option it is applied to every cell; otherwise each cell gets
/// an independent uniform pick from `rng`. Quarter turns are only possible on
/// square cells; the whole pass is rejected up front if one would be needed
/// on a non-square cell.
///
/// # Returns
/// The number of cells that were actually turned.
pub fn rotate_cells<R: Rng + ?Sized>(
    image: &mut RgbaImage,
    cells: &[CellBox],
    options: &[Rotation],
    rng: &mut R,
) -> Result<usize, TransformError> {
    if options.is_empty() {
        return Err(TransformError::NoRotationOptions);
    }
    check_bounds(image, cells)?;
    if let Some(quarter) = options.iter().find(|r| r.is_quarter_turn()) {
        if let Some(cell) = cells.iter().find(|c| !c.is_square()) {
            return Err(TransformError::NonSquareRotation { cell: *cell, degrees: quarter.degrees() });
        }
    }

    let mut rotated = 0;
    for cell in cells {
        let rotation = if options.len() == 1 { options[0] } else { options[rng.gen_range(0..options.len())] };
        let region = match rotation {
            Rotation::None => continue,
            Rotation::Deg90 => imageops::rotate90(&extract_region(image, cell)),
            Rotation::Deg180 => imageops::rotate180(&extract_region(image, cell)),
            Rotation::Deg270 => imageops::rotate270(&extract_region(image, cell)),
        };
        paste_region(image, &region, cell);
        rotated += 1;
        debug!("Rotated box {} by {}", cell, rotation);
    }
    Ok(rotated)
}

/// Encode `region` in `format` and decode it again.
///
/// Swapped regions pass through the source image's own encoding so that
/// format-specific channel handling (dropped alpha, lossy compression) applies
/// to them the same way it applies to the rest of the output.
pub fn round_trip(region: &RgbaImage, format: ImageFormat) -> Result<RgbaImage, TransformError> {
    let mut bytes = Cursor::new(Vec::new());
    to_encodable(region, format).write_to(&mut bytes, format)?;
    let decoded = image::load_from_memory_with_format(bytes.get_ref(), format)?;
    Ok(decoded.to_rgba8())
}

/// Shuffle the cells, pair them up in order and exchange each pair's pixels.
///
/// An odd cell out stays where it is. `format` is the image's native
/// encoding; when `None` regions are exchanged without a round-trip.
///
/// # Returns
/// The number of pairs swapped.
pub fn swap_cells<R: Rng + ?Sized>(
    image: &mut RgbaImage,
    cells: &[CellBox],
    format: Option<ImageFormat>,
    rng: &mut R,
) -> Result<usize, TransformError> {
    check_bounds(image, cells)?;
    let mut shuffled = cells.to_vec();
    shuffled.shuffle(rng);

    let pairs: Vec<(CellBox, CellBox)> = shuffled.chunks_exact(2).map(|p| (p[0], p[1])).collect();
    if let Some((first, second)) = pairs.iter().find(|(a, b)| !a.same_size(b)) {
        return Err(TransformError::MismatchedPair { first: *first, second: *second });
    }

    for (first, second) in &pairs {
        let mut first_region = extract_region(image, first);
        let mut second_region = extract_region(image, second);
        if let Some(format) = format {
            first_region = round_trip(&first_region, format)?;
            second_region = round_trip(&second_region, format)?;
        }
        paste_region(image, &first_region, second);
        paste_region(image, &second_region, first);
        debug!("Swapped boxes {} and {}", first, second);
    }
    Ok(pairs.len())
}

/// Per-channel mean of the pixels under `cell`, truncated toward zero.
///
/// Returns `None` for a zero-area cell.
pub fn mean_color(image: &RgbaImage, cell: &CellBox) -> Option<Rgba<u8>> {
    let count = cell.area();
    if count == 0 {
        return None;
    }
    let mut sums = [0u64; 4];
    for y in cell.top..cell.bottom {
        for x in cell.left..cell.right {
            let pixel = image.get_pixel(x, y);
            for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                *sum += channel as u64;
            }
        }
    }
    Some(Rgba(sums.map(|s| (s / count) as u8)))
}

/// Replace each cell with a flat fill of its mean color.
///
/// # Returns
/// The number of cells filled.
pub fn average_cells(image: &mut RgbaImage, cells: &[CellBox]) -> Result<usize, TransformError> {
    check_bounds(image, cells)?;
    let mut averaged = 0;
    for cell in cells {
        let Some(color) = mean_color(image, cell) else {
            continue;
        };
        for y in cell.top..cell.bottom {
            for x in cell.left..cell.right {
                image.put_pixel(x, y, color);
            }
        }
        averaged += 1;
        debug!("Averaged box {}", cell);
    }
    Ok(averaged)
}
