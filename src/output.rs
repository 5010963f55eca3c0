//! Frame output, resizing and file name generation

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default frame file pattern: `{basename}-{cellSize:04d}{ext}`.
pub const DEFAULT_FRAME_PATTERN: &str = "{name}-{size:04}{ext}";

/// Error type for output operations
#[derive(Debug)]
pub enum OutputError {
    /// IO error during file operations
    Io(io::Error),
    /// Image encoding error
    Image(image::ImageError),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::Io(e) => write!(f, "IO error: {}", e),
            OutputError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::Io(e) => Some(e),
            OutputError::Image(e) => Some(e),
        }
    }
}

impl From<io::Error> for OutputError {
    fn from(e: io::Error) -> Self {
        OutputError::Io(e)
    }
}

impl From<image::ImageError> for OutputError {
    fn from(e: image::ImageError) -> Self {
        OutputError::Image(e)
    }
}

impl OutputError {
    /// True when the target format has no encoder for this kind of image.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, OutputError::Image(image::ImageError::Unsupported(_)))
    }
}

/// Wrap `image` in the color type `format` can store.
///
/// JPEG has no alpha channel, so RGBA buffers are flattened to RGB first.
pub fn to_encodable(image: &RgbaImage, format: ImageFormat) -> DynamicImage {
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image.clone()).to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.clone()),
    }
}

/// Encode a 1x1 RGBA frame as `format` in memory.
///
/// Succeeds only when frames can actually be written in that format, so a run
/// can reject a missing or RGBA-incapable encoder before it writes anything.
pub fn check_encodable(format: ImageFormat) -> Result<(), OutputError> {
    let mut bytes = Cursor::new(Vec::new());
    to_encodable(&RgbaImage::new(1, 1), format).write_to(&mut bytes, format)?;
    Ok(())
}

/// Create the parent directory of `path` if it's missing.
pub fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Save a frame in the given format.
///
/// # Arguments
///
/// * `image` - The frame to save
/// * `path` - The output file path
/// * `format` - Encoding to use; usually the source image's own format
pub fn save_frame(image: &RgbaImage, path: &Path, format: ImageFormat) -> Result<(), OutputError> {
    ensure_parent(path)?;
    to_encodable(image, format).save_with_format(path, format)?;
    Ok(())
}

/// Resize an image before it is cut into cells.
///
/// A zero in either target dimension is derived from the other one, keeping
/// the aspect ratio. Both zero leaves the image untouched. Nearest-neighbour
/// sampling keeps cell edges hard.
pub fn resize_image(image: RgbaImage, target: (u32, u32)) -> RgbaImage {
    let (cur_w, cur_h) = image.dimensions();
    let (width, height) = match target {
        (0, 0) => return image,
        (0, h) => (((cur_w as f64 / cur_h as f64) * h as f64) as u32, h),
        (w, 0) => (w, ((cur_h as f64 / cur_w as f64) * w as f64) as u32),
        (w, h) => (w, h),
    };
    if (width, height) == (cur_w, cur_h) {
        return image;
    }
    image::imageops::resize(&image, width.max(1), height.max(1), FilterType::Nearest)
}

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(name|ext|size)(?::0(\d+))?\}").ok()).as_ref()
}

/// Where a run writes its files and how they are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputNaming {
    /// Directory all outputs are written into
    pub dir: PathBuf,
    /// File stem shared by frames and the animation
    pub basename: String,
    /// Frame extension including the dot, e.g. `.png`
    pub ext: String,
    /// Frame file pattern with `{name}`, `{size}`, `{size:0N}` and `{ext}` placeholders
    #[serde(default = "default_frame_pattern")]
    pub frame_pattern: String,
}

fn default_frame_pattern() -> String {
    DEFAULT_FRAME_PATTERN.to_string()
}

impl OutputNaming {
    /// Name outputs after `input`, writing next to it unless `dir` is given.
    pub fn for_input(input: &Path, dir: Option<&Path>) -> Self {
        let basename = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output").to_string();
        let ext = input
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| ".png".to_string());
        let dir = match dir {
            Some(d) => d.to_path_buf(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        Self { dir, basename, ext, frame_pattern: default_frame_pattern() }
    }

    /// True if the pattern gives each cell size its own file name.
    pub fn pattern_has_size(&self) -> bool {
        placeholder_regex()
            .is_some_and(|re| re.captures_iter(&self.frame_pattern).any(|c| &c[1] == "size"))
    }

    /// File name of the frame for `cell_size`.
    pub fn frame_name(&self, cell_size: u32) -> String {
        let Some(re) = placeholder_regex() else {
            return self.frame_pattern.clone();
        };
        re.replace_all(&self.frame_pattern, |caps: &Captures| match &caps[1] {
            "name" => self.basename.clone(),
            "ext" => self.ext.clone(),
            _ => match caps.get(2).and_then(|w| w.as_str().parse::<usize>().ok()) {
                Some(width) => format!("{:0width$}", cell_size, width = width),
                None => cell_size.to_string(),
            },
        })
        .into_owned()
    }

    /// File name of the looping animation.
    pub fn animation_name(&self) -> String {
        format!("{}.gif", self.basename)
    }

    /// The encoding frames are written in, derived from the extension.
    pub fn frame_format(&self) -> Option<ImageFormat> {
        ImageFormat::from_extension(self.ext.trim_start_matches('.'))
    }
}

/// Writes frames for one run and remembers them so a failed run can undo them.
#[derive(Debug)]
pub struct FrameWriter {
    naming: OutputNaming,
    format: ImageFormat,
    written: Vec<PathBuf>,
    names: Vec<String>,
}

impl FrameWriter {
    pub fn new(naming: OutputNaming, format: ImageFormat) -> Self {
        Self { naming, format, written: Vec::new(), names: Vec::new() }
    }

    /// Save the frame for `cell_size`, returning its file name.
    pub fn write(&mut self, image: &RgbaImage, cell_size: u32) -> Result<String, OutputError> {
        let name = self.naming.frame_name(cell_size);
        let path = self.naming.dir.join(&name);
        save_frame(image, &path, self.format)?;
        info!("Saved frame {}", path.display());
        self.written.push(path);
        self.names.push(name.clone());
        Ok(name)
    }

    /// File names written so far, in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Keep the written files and hand back their names.
    pub fn finish(self) -> Vec<String> {
        self.names
    }

    /// Remove every file written by this writer.
    pub fn rollback(self) {
        for path in &self.written {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove partial output {}: {}", path.display(), e);
            }
        }
    }
}
