//! Configuration schema types for `imanip.toml`
//!
//! Defines the defaults a project can set for every run and how they are
//! validated.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::animation::DEFAULT_DELAY_MS;
use crate::grid::Orientation;
use crate::output::DEFAULT_FRAME_PATTERN;
use crate::transforms::RotateMode;

/// Default settings applied to every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// First cell size
    #[serde(default)]
    pub box_size: u32,
    /// Number of doubling passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Cell shape
    #[serde(default)]
    pub orientation: Orientation,
    /// Rotation family
    #[serde(default)]
    pub rotate: RotateMode,
    /// Swap random pairs of cells
    #[serde(default)]
    pub randomize: bool,
    /// Flatten cells to their mean color
    #[serde(default)]
    pub average: bool,
    /// Delay between animation frames in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            box_size: 0,
            iterations: default_iterations(),
            orientation: Orientation::default(),
            rotate: RotateMode::default(),
            randomize: false,
            average: false,
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_iterations() -> u32 {
    1
}

fn default_delay_ms() -> u32 {
    DEFAULT_DELAY_MS
}

/// Output location and naming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for frames and animations; next to the input when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Frame file pattern
    #[serde(default = "default_frame_pattern")]
    pub frame_pattern: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: None, frame_pattern: default_frame_pattern() }
    }
}

fn default_frame_pattern() -> String {
    DEFAULT_FRAME_PATTERN.to_string()
}

/// Root of `imanip.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImanipConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "defaults.delay_ms")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "imanip.toml: '{}' {}", self.field, self.message)
    }
}

impl ImanipConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.defaults.delay_ms == 0 {
            errors.push(ConfigValidationError {
                field: "defaults.delay_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.defaults.rotate == RotateMode::NinetyMultiples
            && self.defaults.orientation != Orientation::Square
        {
            errors.push(ConfigValidationError {
                field: "defaults.rotate".to_string(),
                message: format!(
                    "'ninety-multiples' needs square cells, orientation is '{}'",
                    self.defaults.orientation
                ),
            });
        }

        if self.output.frame_pattern.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "output.frame_pattern".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ImanipConfig = toml::from_str("").unwrap();
        assert_eq!(config, ImanipConfig::default());
        assert_eq!(config.defaults.iterations, 1);
        assert_eq!(config.defaults.delay_ms, 100);
        assert_eq!(config.output.frame_pattern, "{name}-{size:04}{ext}");
    }

    #[test]
    fn test_full_config_parses() {
        let config: ImanipConfig = toml::from_str(
            r#"
[defaults]
box_size = 4
iterations = 3
orientation = "horizontal"
rotate = "flip"
randomize = true
delay_ms = 80

[output]
dir = "out"
frame_pattern = "{size}-{name}{ext}"
"#,
        )
        .unwrap();
        assert_eq!(config.defaults.box_size, 4);
        assert_eq!(config.defaults.orientation, Orientation::Horizontal);
        assert_eq!(config.defaults.rotate, RotateMode::Flip);
        assert!(config.defaults.randomize);
        assert_eq!(config.output.dir, Some(PathBuf::from("out")));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_catches_errors() {
        let mut config = ImanipConfig::default();
        config.defaults.delay_ms = 0;
        config.defaults.orientation = Orientation::Vertical;
        config.defaults.rotate = RotateMode::NinetyMultiples;
        config.output.frame_pattern = " ".to_string();

        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["defaults.delay_ms", "defaults.rotate", "output.frame_pattern"]);
    }
}
