//! imanip - Library for cutting images into cells and animating the results
//!
//! This library provides functionality to:
//! - Partition an image into square cells or full-length strips
//! - Rotate, shuffle or flatten each cell to its mean color
//! - Repeat the pass at doubling cell sizes and save each frame
//! - Loop the frames back and forth into an animated GIF

pub mod animation;
pub mod cli;
pub mod config;
pub mod engine;
pub mod grid;
pub mod jobs;
pub mod output;
pub mod sequencer;
pub mod transforms;
pub mod wire;

pub use engine::{run, run_file, EngineError, RunConfig};
pub use wire::RunResult;
