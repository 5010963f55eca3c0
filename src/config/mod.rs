//! Configuration module for imanip runs
//!
//! Provides types and parsing for the `imanip.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{find_config, load_config, merge_cli_overrides, CliOverrides, ConfigError, CONFIG_FILE};
pub use schema::*;
