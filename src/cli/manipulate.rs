//! Single-image and directory runs

use std::collections::hash_map::{Entry, HashMap};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rayon::prelude::*;
use tracing::{debug, info};

use super::{find_image_files, Cli, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::config::{load_config, merge_cli_overrides, CliOverrides, ConfigError, ImanipConfig};
use crate::engine::{run_file, EngineError, RunConfig};
use crate::grid::Orientation;
use crate::output::OutputNaming;
use crate::transforms::RotateMode;

/// Load `imanip.toml` (explicit or discovered) and fold the command line over it.
pub(crate) fn load_file_config(cli: &Cli) -> Result<ImanipConfig, ConfigError> {
    let mut config = load_config(cli.config.as_deref())?;
    merge_cli_overrides(&mut config, &overrides(cli));
    Ok(config)
}

fn overrides(cli: &Cli) -> CliOverrides {
    let orientation = if cli.vertical {
        Some(Orientation::Vertical)
    } else if cli.horizontal {
        Some(Orientation::Horizontal)
    } else {
        None
    };
    let rotate = if cli.flip {
        Some(RotateMode::Flip)
    } else if cli.ninety {
        Some(RotateMode::NinetyMultiples)
    } else {
        None
    };
    CliOverrides {
        box_size: cli.box_size,
        iterations: cli.iterations,
        orientation,
        rotate,
        randomize: cli.random.then_some(true),
        average: cli.average.then_some(true),
        delay_ms: cli.delay,
        dir: cli.output.clone(),
        frame_pattern: cli.frame_pattern.clone(),
    }
}

/// Build the run for one input file.
pub(crate) fn build_run_config(input: &Path, cli: &Cli, config: &ImanipConfig) -> RunConfig {
    let defaults = &config.defaults;
    let mut naming = OutputNaming::for_input(input, config.output.dir.as_deref());
    naming.frame_pattern = config.output.frame_pattern.clone();

    let mut run = RunConfig::new(naming);
    run.cell_size = defaults.box_size;
    run.iterations = defaults.iterations;
    run.auto = cli.auto;
    run.orientation = defaults.orientation;
    run.rotate_mode = defaults.rotate;
    run.randomize = defaults.randomize;
    run.average = defaults.average;
    run.save_all_frames = cli.frames;
    run.produce_animation = !cli.nogif;
    run.rng_seed = cli.seed;
    run.resize = cli.resize.as_ref().and_then(|r| match r.as_slice() {
        [w, h] => Some((*w, *h)),
        _ => None,
    });
    run.frame_delay_ms = defaults.delay_ms;
    run
}

fn exit_code_for(e: &EngineError) -> u8 {
    match e {
        EngineError::Config(_) | EngineError::InvalidCellSize { .. } => EXIT_INVALID_ARGS,
        _ => EXIT_ERROR,
    }
}

/// Process one image and print its result line.
pub(crate) fn run_single(path: &Path, cli: &Cli, config: &ImanipConfig) -> ExitCode {
    let run = build_run_config(path, cli, config);
    debug!("Run config for {}: {:?}", path.display(), run);

    let result = match run_file(path, &run) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}: {}", path.display(), e);
            return ExitCode::from(exit_code_for(&e));
        }
    };

    match result.to_wire_json() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Output files two runs would both write: `(first input, second input, shared path)`.
///
/// Runs in a batch proceed in parallel, so two inputs resolving to the same
/// animation or frame names would overwrite (or roll back) each other's files.
pub(crate) fn output_collisions(runs: &[(PathBuf, RunConfig)]) -> Vec<(PathBuf, PathBuf, PathBuf)> {
    let mut owners: HashMap<PathBuf, &Path> = HashMap::new();
    let mut collisions = Vec::new();
    for (input, run) in runs {
        let naming = &run.output;
        let mut targets = vec![naming.dir.join(naming.animation_name())];
        let frame = naming.dir.join(naming.frame_name(1));
        if !targets.contains(&frame) {
            targets.push(frame);
        }
        for target in targets {
            match owners.entry(target) {
                Entry::Occupied(owner) => {
                    collisions.push((owner.get().to_path_buf(), input.clone(), owner.key().clone()))
                }
                Entry::Vacant(slot) => {
                    slot.insert(input);
                }
            }
        }
    }
    collisions
}

/// Process every image under `dir` in parallel, one result line per image.
pub(crate) fn run_directory(dir: &Path, cli: &Cli, config: &ImanipConfig) -> ExitCode {
    if !dir.is_dir() {
        eprintln!("Error: '{}' is not a directory", dir.display());
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let files = find_image_files(dir);
    if files.is_empty() {
        eprintln!("Error: no images found in {}", dir.display());
        return ExitCode::from(EXIT_ERROR);
    }
    let runs: Vec<(PathBuf, RunConfig)> =
        files.iter().map(|path| (path.clone(), build_run_config(path, cli, config))).collect();
    let collisions = output_collisions(&runs);
    if !collisions.is_empty() {
        for (first, second, target) in &collisions {
            eprintln!("Error: {} and {} would both write {}", first.display(), second.display(), target.display());
        }
        eprintln!("Use --frame-pattern or rename the inputs so every image gets its own outputs");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }
    info!("Processing {} images from {}", runs.len(), dir.display());

    let outcomes: Vec<(PathBuf, Result<String, String>)> = runs
        .par_iter()
        .map(|(path, run)| {
            let outcome = run_file(path, run)
                .map_err(|e| e.to_string())
                .and_then(|result| result.to_wire_json().map_err(|e| e.to_string()));
            (path.clone(), outcome)
        })
        .collect();

    let mut failed = 0;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        eprintln!("{} of {} images failed", failed, files.len());
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_build_run_config_from_flags() {
        let cli = parse(&[
            "imanip", "x.png", "-b", "3", "-i", "2", "-H", "-n", "-r", "--frames", "--seed", "9", "--resize",
            "10", "0",
        ]);
        let mut config = ImanipConfig::default();
        merge_cli_overrides(&mut config, &overrides(&cli));
        let run = build_run_config(Path::new("in/x.png"), &cli, &config);

        assert_eq!(run.cell_size, 3);
        assert_eq!(run.iterations, 2);
        assert_eq!(run.orientation, Orientation::Horizontal);
        assert_eq!(run.rotate_mode, RotateMode::NinetyMultiples);
        assert!(run.randomize && run.save_all_frames && run.produce_animation);
        assert_eq!(run.rng_seed, Some(9));
        assert_eq!(run.resize, Some((10, 0)));
        assert_eq!(run.output.dir, PathBuf::from("in"));
        assert_eq!(run.output.basename, "x");
    }

    #[test]
    fn test_file_defaults_survive_without_flags() {
        let cli = parse(&["imanip", "x.png", "--nogif"]);
        let mut config = ImanipConfig::default();
        config.defaults.box_size = 8;
        config.defaults.average = true;
        config.output.dir = Some(PathBuf::from("out"));
        merge_cli_overrides(&mut config, &overrides(&cli));
        let run = build_run_config(Path::new("x.png"), &cli, &config);

        assert_eq!(run.cell_size, 8);
        assert!(run.average);
        assert!(!run.produce_animation);
        assert_eq!(run.output.dir, PathBuf::from("out"));
    }

    #[test]
    fn test_output_collisions_by_stem() {
        let cli = parse(&["imanip", "--auto"]);
        let config = ImanipConfig::default();
        let runs: Vec<(PathBuf, RunConfig)> = ["pics/cat.png", "pics/cat.bmp", "pics/dog.png", "other/cat.png"]
            .iter()
            .map(|p| (PathBuf::from(p), build_run_config(Path::new(p), &cli, &config)))
            .collect();

        let collisions = output_collisions(&runs);
        assert_eq!(collisions.len(), 1);
        let (first, second, target) = &collisions[0];
        assert_eq!(first, &PathBuf::from("pics/cat.png"));
        assert_eq!(second, &PathBuf::from("pics/cat.bmp"));
        assert_eq!(target, &PathBuf::from("pics/cat.gif"));
    }

    #[test]
    fn test_output_collisions_with_shared_output_dir() {
        let cli = parse(&["imanip", "--auto", "-o", "out"]);
        let mut config = ImanipConfig::default();
        merge_cli_overrides(&mut config, &overrides(&cli));
        let runs: Vec<(PathBuf, RunConfig)> = ["a/cat.png", "b/cat.png"]
            .iter()
            .map(|p| (PathBuf::from(p), build_run_config(Path::new(p), &cli, &config)))
            .collect();

        let targets: Vec<PathBuf> = output_collisions(&runs).into_iter().map(|(_, _, t)| t).collect();
        assert_eq!(targets, vec![PathBuf::from("out/cat.gif"), PathBuf::from("out/cat-0001.png")]);
    }

    #[test]
    fn test_frame_pattern_without_name_collides() {
        let cli = parse(&["imanip", "--auto", "--frame-pattern", "{size}{ext}"]);
        let mut config = ImanipConfig::default();
        merge_cli_overrides(&mut config, &overrides(&cli));
        let runs: Vec<(PathBuf, RunConfig)> = ["x/a.png", "x/b.png"]
            .iter()
            .map(|p| (PathBuf::from(p), build_run_config(Path::new(p), &cli, &config)))
            .collect();

        let targets: Vec<PathBuf> = output_collisions(&runs).into_iter().map(|(_, _, t)| t).collect();
        assert_eq!(targets, vec![PathBuf::from("x/1.png")]);
    }

    #[test]
    fn test_config_errors_map_to_invalid_args() {
        assert_eq!(exit_code_for(&EngineError::Config("x".into())), EXIT_INVALID_ARGS);
        assert_eq!(exit_code_for(&EngineError::Cancelled), EXIT_ERROR);
    }
}
