//! Command-line interface implementation
//!
//! This module parses arguments, sets up logging and hands off to
//! [`manipulate`] for single images and directory batches.

mod manipulate;

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

use glob::{glob, Pattern};
use tracing_subscriber::EnvFilter;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Extensions picked up in directory mode.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Check if a path has an extension directory mode processes.
pub fn is_image_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Find all image files in a directory (recursively).
pub fn find_image_files(dir: &std::path::Path) -> Vec<PathBuf> {
    let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file() && is_image_file(p)).collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// imanip - cut an image into cells, transform them, and loop the results into a GIF
#[derive(Parser, Debug)]
#[command(name = "imanip")]
#[command(about = "Cut images into cells, rotate, shuffle or average them, and loop the frames into a GIF")]
#[command(version)]
pub struct Cli {
    /// Path to the image to manipulate
    pub image_path: Option<PathBuf>,

    /// Resize to X by Y before manipulating; a 0 side keeps the aspect ratio
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    pub resize: Option<Vec<u32>>,

    /// Size of the cells the first frame is split into
    #[arg(short = 'b', long = "box-size", alias = "box_size")]
    pub box_size: Option<u32>,

    /// Number of frames, doubling the cell size each time
    #[arg(short, long)]
    pub iterations: Option<u32>,

    /// Keep doubling from the box size (1 if unset) while twice the cell still fits the image
    #[arg(long)]
    pub auto: bool,

    /// Use vertical strips instead of square cells
    #[arg(short, long, conflicts_with = "horizontal")]
    pub vertical: bool,

    /// Use horizontal strips instead of square cells
    #[arg(short = 'H', long)]
    pub horizontal: bool,

    /// Flip each cell
    #[arg(short, long, conflicts_with = "ninety")]
    pub flip: bool,

    /// Rotate each cell a random multiple of ninety degrees
    #[arg(short, long)]
    pub ninety: bool,

    /// Randomize the position of cells
    #[arg(short, long)]
    pub random: bool,

    /// Color each cell the average color of its pixels
    #[arg(short, long)]
    pub average: bool,

    /// Save each frame along with the gif
    #[arg(long)]
    pub frames: bool,

    /// Do not create a gif from the frames
    #[arg(long)]
    pub nogif: bool,

    /// Directory to save the gif and frames in
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory of images to process, recursively
    #[arg(long = "directory", alias = "dir")]
    pub directory: Option<PathBuf>,

    /// Seed for random rotations and swaps
    #[arg(long)]
    pub seed: Option<u64>,

    /// Delay between animation frames in milliseconds
    #[arg(long)]
    pub delay: Option<u32>,

    /// Frame file pattern ({name}, {size}, {size:04}, {ext})
    #[arg(long)]
    pub frame_pattern: Option<String>,

    /// Config file (default: imanip.toml found from the working directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print debugging output while running
    #[arg(short, long)]
    pub debug: bool,
}

/// Install the tracing subscriber on stderr, keeping stdout for results.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = match manipulate::load_file_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    if let Some(dir) = &cli.directory {
        manipulate::run_directory(dir, &cli, &config)
    } else if let Some(path) = &cli.image_path {
        manipulate::run_single(path, &cli, &config)
    } else {
        let _ = Cli::command().print_help();
        ExitCode::from(EXIT_INVALID_ARGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.png")));
        assert!(is_image_file(Path::new("dir/b.JPG")));
        assert!(is_image_file(Path::new("c.bmp")));
        assert!(!is_image_file(Path::new("d.txt")));
        assert!(!is_image_file(Path::new("png")));
    }

    #[test]
    fn test_find_image_files() {
        use std::fs;
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let dir_path = temp_dir.path();
        fs::write(dir_path.join("one.png"), "x").unwrap();
        fs::write(dir_path.join("two.jpeg"), "x").unwrap();
        fs::write(dir_path.join("notes.txt"), "ignored").unwrap();
        let sub_dir = dir_path.join("nested");
        fs::create_dir(&sub_dir).unwrap();
        fs::write(sub_dir.join("three.gif"), "x").unwrap();

        let files = find_image_files(dir_path);
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| is_image_file(f)));
    }

    #[test]
    fn test_find_image_files_escapes_directory_name() {
        use std::fs;
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let dir_path = temp_dir.path().join("shots[1]");
        fs::create_dir(&dir_path).unwrap();
        fs::write(dir_path.join("one.png"), "x").unwrap();

        assert_eq!(find_image_files(&dir_path), vec![dir_path.join("one.png")]);
    }

    #[test]
    fn test_cli_parses_historical_flags() {
        let cli = Cli::try_parse_from([
            "imanip", "cat.png", "--box_size", "4", "-i", "3", "-v", "-f", "-r", "--frames", "--nogif",
            "--resize", "64", "0",
        ])
        .unwrap();
        assert_eq!(cli.box_size, Some(4));
        assert_eq!(cli.iterations, Some(3));
        assert!(cli.vertical && cli.flip && cli.random && cli.frames && cli.nogif);
        assert_eq!(cli.resize, Some(vec![64, 0]));
    }

    #[test]
    fn test_cli_rejects_conflicting_shapes() {
        assert!(Cli::try_parse_from(["imanip", "cat.png", "--vertical", "--horizontal"]).is_err());
        assert!(Cli::try_parse_from(["imanip", "cat.png", "--flip", "--ninety"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
