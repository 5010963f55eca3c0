//! Configuration loading and discovery for `imanip.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::ImanipConfig;
use crate::grid::Orientation;
use crate::transforms::RotateMode;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "imanip.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse imanip.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override first cell size
    pub box_size: Option<u32>,
    /// Override iteration count
    pub iterations: Option<u32>,
    /// Override cell shape
    pub orientation: Option<Orientation>,
    /// Override rotation family
    pub rotate: Option<RotateMode>,
    /// Force swapping on
    pub randomize: Option<bool>,
    /// Force averaging on
    pub average: Option<bool>,
    /// Override frame delay
    pub delay_ms: Option<u32>,
    /// Override output directory
    pub dir: Option<PathBuf>,
    /// Override frame file pattern
    pub frame_pattern: Option<String>,
}

/// Find imanip.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for imanip.toml
/// 2. Check XDG_CONFIG_HOME/imanip/imanip.toml (or ~/.config/imanip/imanip.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find imanip.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("imanip").join(CONFIG_FILE);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find imanip.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an imanip.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration.
pub fn load_config(path: Option<&Path>) -> Result<ImanipConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(ImanipConfig::default()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<ImanipConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ImanipConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut ImanipConfig, overrides: &CliOverrides) {
    if let Some(box_size) = overrides.box_size {
        config.defaults.box_size = box_size;
    }
    if let Some(iterations) = overrides.iterations {
        config.defaults.iterations = iterations;
    }
    if let Some(orientation) = overrides.orientation {
        config.defaults.orientation = orientation;
    }
    if let Some(rotate) = overrides.rotate {
        config.defaults.rotate = rotate;
    }
    if let Some(randomize) = overrides.randomize {
        config.defaults.randomize = randomize;
    }
    if let Some(average) = overrides.average {
        config.defaults.average = average;
    }
    if let Some(delay_ms) = overrides.delay_ms {
        config.defaults.delay_ms = delay_ms;
    }
    if let Some(ref dir) = overrides.dir {
        config.output.dir = Some(dir.clone());
    }
    if let Some(ref frame_pattern) = overrides.frame_pattern {
        config.output.frame_pattern = frame_pattern.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(b"[defaults]\nbox_size = 2")
            .expect("should write config content");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(b"[defaults]\nbox_size = 2")
            .expect("should write config content");

        let subdir = temp.path().join("photos").join("2024");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(
                br#"
[defaults]
box_size = 8
orientation = "vertical"
average = true
"#,
            )
            .expect("should write config content");

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.defaults.box_size, 8);
        assert_eq!(config.defaults.orientation, Orientation::Vertical);
        assert!(config.defaults.average);
        assert_eq!(config.defaults.iterations, 1);
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(b"this is not valid toml {{{")
            .expect("should write invalid config");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(b"[defaults]\ndelay_ms = 0\n")
            .expect("should write invalid config");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = ImanipConfig::default();
        config.defaults.box_size = 4;
        let overrides = CliOverrides {
            iterations: Some(5),
            rotate: Some(RotateMode::Flip),
            dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        merge_cli_overrides(&mut config, &overrides);

        assert_eq!(config.defaults.box_size, 4);
        assert_eq!(config.defaults.iterations, 5);
        assert_eq!(config.defaults.rotate, RotateMode::Flip);
        assert_eq!(config.output.dir, Some(PathBuf::from("out")));
    }
}
