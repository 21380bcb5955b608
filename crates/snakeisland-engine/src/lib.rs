//! snakeisland-engine: Active contour (snake) optimization (sans-IO).
//!
//! Fits an open snake of integer control points to features of a raster
//! image: build an [`EnergyField`] once per image, place a [`Snake`] on it
//! and let the [`GreedyOptimizer`] move the points coarse-to-fine through
//! the field's scale space.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices and returns structured data. Reading files and
//! the system clock lives in `snakeisland-bench`.

pub mod blur;
pub mod diagnostics;
pub mod energy;
pub mod field;
pub mod gradient;
pub mod optimize;
pub mod persist;
pub mod profile;
pub mod sampling;
pub mod schedule;
pub mod snake;
pub mod source;
pub mod spline;
pub mod types;

use diagnostics::{Clock, NoClock, OptimizationDiagnostics, OptimizationSummary};

pub use energy::{EnergyField, EnergyKind, ExternalEnergy};
pub use optimize::GreedyOptimizer;
pub use persist::SnakeFile;
pub use snake::Snake;
pub use source::{SourceImage, decode};
pub use spline::SplineCurve;
pub use types::{
    ControlPoint, Dimensions, Iteration, Point, SnakeConfig, SnakeError, Snapshot, Vector,
    Weights,
};

/// Snapshots and timing of a [`trace_with_diagnostics`] run.
#[derive(Debug, Clone)]
pub struct TraceResult {
    /// One snapshot per optimization sweep.
    pub snapshots: Vec<Snapshot>,
    /// The snake after the last sweep.
    pub snake: SnakeFile,
    /// Per-sweep timing and energies.
    pub diagnostics: OptimizationDiagnostics,
}

/// Optimize a saved snake against `source`.
///
/// # Steps
///
/// 1. Validate the configuration
/// 2. Build the configured energy field
/// 3. Place the saved control points and flip flag on a new snake
/// 4. Run the greedy optimizer for `config.optimization_steps` sweeps
///
/// # Errors
///
/// Returns [`SnakeError::InvalidConfig`] for a bad configuration,
/// [`SnakeError::DegenerateImage`] if the image cannot carry an energy and
/// [`SnakeError::OutOfBounds`] if a saved point lies outside the image.
pub fn trace(
    source: &SourceImage,
    snake_file: &SnakeFile,
    config: &SnakeConfig,
) -> Result<Vec<Snapshot>, SnakeError> {
    Ok(trace_with_diagnostics(source, snake_file, config, &NoClock)?.snapshots)
}

/// Like [`trace`], also collecting timing and energy diagnostics.
///
/// # Errors
///
/// Same as [`trace`].
pub fn trace_with_diagnostics<C: Clock>(
    source: &SourceImage,
    snake_file: &SnakeFile,
    config: &SnakeConfig,
    clock: &C,
) -> Result<TraceResult, SnakeError> {
    config.validate()?;
    let run_start = clock.now();

    let build_start = clock.now();
    let field = EnergyField::from_config(source, config)?;
    let field_build = clock.elapsed(&build_start);

    let mut snake = Snake::new(&field, config.goal_length)?;
    snake.set_weights(config.weights())?;
    snake_file.apply(&mut snake)?;
    let initial_energy = snake.energy();

    let optimizer = config
        .fixed_step_size
        .map_or_else(GreedyOptimizer::new, GreedyOptimizer::with_fixed_step);
    let (snapshots, iterations) = optimizer.optimize_timed(
        &mut snake,
        config.goal_length,
        config.optimization_steps,
        clock,
        |_| {},
    )?;

    let dims = field.dimensions();
    let diagnostics = OptimizationDiagnostics {
        field_build,
        iterations,
        total_duration: clock.elapsed(&run_start),
        summary: OptimizationSummary {
            image_width: dims.width,
            image_height: dims.height,
            energy: field.kind().name().to_string(),
            control_points: snake.control_points().len(),
            initial_energy,
            final_energy: snake.energy(),
        },
    };

    Ok(TraceResult {
        snapshots,
        snake: SnakeFile::from_snake(&snake),
        diagnostics,
    })
}
