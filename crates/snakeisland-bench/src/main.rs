//! snakeisland-bench: CLI tool for snake optimization experiments and
//! diagnostics.
//!
//! Optimizes a saved snake against an image with configurable parameters,
//! printing per-iteration energies and timings. Useful for:
//!
//! - Comparing external energy variants on the same coastline
//! - Tuning scale-space depth, base sigma and goal length
//! - Checking how weights and pinned step sizes change convergence
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin snakeisland-bench -- [OPTIONS] --snake <SNAKE> <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use snakeisland_engine::diagnostics::Clock;
use snakeisland_engine::{EnergyKind, SnakeConfig, SnakeFile};

/// Snake optimization experiments and diagnostics for snakeisland.
///
/// Builds an energy field from the given image, places the saved snake on
/// it and runs the greedy optimizer, printing per-iteration diagnostics.
#[derive(Parser)]
#[command(name = "snakeisland-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP, TIFF).
    #[arg(required_unless_present = "list_energies")]
    image_path: Option<PathBuf>,

    /// Saved snake (`{"controlpoints": [[x, y], ...], "flip": bool}`).
    #[arg(long, required_unless_present = "list_energies")]
    snake: Option<PathBuf>,

    /// External energy variant.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_ENERGY, value_parser = parse_energy)]
    energy: EnergyKind,

    /// Number of scale-space levels.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_SCALE_SPACE_DEPTH, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    depth: usize,

    /// Gaussian sigma of the finest scale-space level.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_BASE_SIGMA)]
    base_sigma: f32,

    /// Preferred distance between control points in pixels.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_GOAL_LENGTH)]
    goal_length: f64,

    /// Number of greedy sweeps.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_OPTIMIZATION_STEPS)]
    steps: u32,

    /// Weight of the spacing and curvature energy.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_WEIGHT)]
    inner_weight: f64,

    /// Weight of the image energy.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_WEIGHT)]
    outer_weight: f64,

    /// Pin the step size instead of following the scale schedule.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    fixed_step: Option<u32>,

    /// Gaussian sigma applied to the decoded image (0 disables).
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_PRE_BLUR_SIGMA)]
    pre_blur: f32,

    /// Invert the saved snake's normal orientation.
    #[arg(long)]
    flip: bool,

    /// Full snake config as a JSON string.
    ///
    /// When provided, all other parameter flags are ignored. The JSON must
    /// be a valid `SnakeConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Write every iteration's snapshot to this file as JSON.
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Write the optimized snake to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the registered energy names and exit.
    #[arg(long)]
    list_energies: bool,
}

fn parse_energy(s: &str) -> Result<EnergyKind, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// Build a [`SnakeConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SnakeConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SnakeConfig {
        energy: cli.energy,
        scale_space_depth: cli.depth,
        base_sigma: cli.base_sigma,
        goal_length: cli.goal_length,
        optimization_steps: cli.steps,
        inner_weight: cli.inner_weight,
        outer_weight: cli.outer_weight,
        fixed_step_size: cli.fixed_step,
        pre_blur_sigma: cli.pre_blur,
    })
}

fn load_snake(path: &Path, flip: bool) -> Result<SnakeFile, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let mut snake = SnakeFile::from_json(&json)
        .map_err(|e| format!("Error parsing {}: {e}", path.display()))?;
    if flip {
        snake.flip = !snake.flip;
    }
    Ok(snake)
}

fn write_file(path: &Path, contents: &str, what: &str) -> Result<(), String> {
    std::fs::write(path, contents)
        .map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    eprintln!(
        "{what} written to {} ({} bytes)",
        path.display(),
        contents.len()
    );
    Ok(())
}

fn run(cli: &Cli) -> Result<(), String> {
    let (Some(image_path), Some(snake_path)) = (&cli.image_path, &cli.snake) else {
        return Err("an image path and --snake are required".to_string());
    };
    let config = config_from_cli(cli)?;
    let saved = load_snake(snake_path, cli.flip)?;

    let image_bytes = std::fs::read(image_path)
        .map_err(|e| format!("Error reading {}: {e}", image_path.display()))?;

    eprintln!(
        "Image: {} ({} bytes)",
        image_path.display(),
        image_bytes.len(),
    );
    eprintln!(
        "Snake: {} ({} control points)",
        snake_path.display(),
        saved.controlpoints.len()
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let source = snakeisland_engine::decode(&image_bytes, config.pre_blur_sigma)
        .map_err(|e| format!("Error decoding {}: {e}", image_path.display()))?;
    let result = snakeisland_engine::trace_with_diagnostics(&source, &saved, &config, &StdClock)
        .map_err(|e| format!("Optimization error: {e}"))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result.diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", result.diagnostics.report());
    }

    if let Some(ref path) = cli.snapshots {
        let json = serde_json::to_string_pretty(&result.snapshots)
            .map_err(|e| format!("Error serializing snapshots: {e}"))?;
        write_file(path, &json, "Snapshots")?;
    }
    if let Some(ref path) = cli.output {
        let json = result
            .snake
            .to_json()
            .map_err(|e| format!("Error serializing snake: {e}"))?;
        write_file(path, &json, "Snake")?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list_energies {
        for name in EnergyKind::names() {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
