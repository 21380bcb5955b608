//! Greedy snake optimization.
//!
//! Every iteration sweeps the control points once in index order. Each
//! point tries staying put and one step along either axis and takes the
//! candidate with the lowest total energy, provided it beats the best energy
//! seen so far in the sweep. Later points are scored against the points
//! already moved. The step size follows the energy field's scale schedule
//! unless it is pinned.
//!
//! Candidate scoring goes through [`Snake::evaluate`], which never touches
//! the snake's caches; the sweep result is committed once at the end.

use crate::diagnostics::{Clock, IterationDiagnostics, NoClock};
use crate::energy::ExternalEnergy;
use crate::snake::Snake;
use crate::types::{ControlPoint, Iteration, SnakeError, Snapshot};

/// Tolerance for comparing a recomputed energy with the sweep's running
/// best.
const ENERGY_EPSILON: f64 = 1e-9;

/// Greedy coarse-to-fine optimizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GreedyOptimizer {
    fixed_step: Option<u32>,
}

/// Result of one sweep, not yet committed to the snake.
struct Sweep {
    points: Vec<ControlPoint>,
    energy: f64,
    moved: usize,
}

impl GreedyOptimizer {
    /// An optimizer whose step size follows the energy field.
    #[must_use]
    pub const fn new() -> Self {
        Self { fixed_step: None }
    }

    /// An optimizer that moves by `step` pixels in every iteration.
    ///
    /// A step of 0 is raised to 1.
    #[must_use]
    pub fn with_fixed_step(step: u32) -> Self {
        Self {
            fixed_step: Some(step.max(1)),
        }
    }

    /// The pinned step size, if any.
    #[must_use]
    pub const fn fixed_step(&self) -> Option<u32> {
        self.fixed_step
    }

    /// Run `steps` greedy sweeps and return one snapshot per sweep.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidGoalLength`] for a bad `goal_length`.
    pub fn optimize(
        &self,
        snake: &mut Snake<'_>,
        goal_length: f64,
        steps: u32,
    ) -> Result<Vec<Snapshot>, SnakeError> {
        self.optimize_with(snake, goal_length, steps, |_| {})
    }

    /// Like [`optimize`](Self::optimize), handing every snapshot to
    /// `on_iteration` as soon as it is taken.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidGoalLength`] for a bad `goal_length`.
    pub fn optimize_with(
        &self,
        snake: &mut Snake<'_>,
        goal_length: f64,
        steps: u32,
        on_iteration: impl FnMut(&Snapshot),
    ) -> Result<Vec<Snapshot>, SnakeError> {
        let (snapshots, _) = self.run(snake, goal_length, steps, &NoClock, on_iteration)?;
        Ok(snapshots)
    }

    /// Like [`optimize_with`](Self::optimize_with), also timing every sweep
    /// with `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidGoalLength`] for a bad `goal_length`.
    pub fn optimize_timed<C: Clock>(
        &self,
        snake: &mut Snake<'_>,
        goal_length: f64,
        steps: u32,
        clock: &C,
        on_iteration: impl FnMut(&Snapshot),
    ) -> Result<(Vec<Snapshot>, Vec<IterationDiagnostics>), SnakeError> {
        self.run(snake, goal_length, steps, clock, on_iteration)
    }

    fn run<C: Clock>(
        &self,
        snake: &mut Snake<'_>,
        goal_length: f64,
        steps: u32,
        clock: &C,
        mut on_iteration: impl FnMut(&Snapshot),
    ) -> Result<(Vec<Snapshot>, Vec<IterationDiagnostics>), SnakeError> {
        snake.set_goal_length(goal_length)?;
        let field = snake.field();
        log::info!(
            "optimizing {} control points over {steps} iterations ({}, energy {:.3})",
            snake.control_points().len(),
            field.kind(),
            snake.energy(),
        );

        let mut snapshots = Vec::with_capacity(steps as usize);
        let mut diagnostics = Vec::with_capacity(steps as usize);

        for i in 1..=steps {
            let start = clock.now();
            let energy_before = snake.energy();

            // A snake that finished a run stays on the level it ended at.
            if !snake.is_optimized() {
                snake.set_iteration(Some(Iteration::new(steps, i)?))?;
            }
            let iteration = snake.iteration();
            let step = self
                .fixed_step
                .unwrap_or_else(|| field.step_size(iteration));
            let scale_step = iteration.is_some_and(|it| field.is_scale_step(it));

            let sweep = sweep(snake, step)?;
            snake.commit(sweep.points)?;
            let energy_after = snake.energy();

            debug_assert!(
                (energy_after - sweep.energy).abs()
                    <= ENERGY_EPSILON * sweep.energy.abs().max(1.0),
                "committed energy {energy_after} differs from sweep energy {}",
                sweep.energy
            );
            debug_assert!(
                i == 1 || scale_step || energy_after <= energy_before + ENERGY_EPSILON,
                "iteration {i} raised the energy from {energy_before} to {energy_after}"
            );

            let scale_index = field.scale_index(iteration);
            log::debug!(
                "iteration {i}/{steps}: scale {scale_index}{} step {step} energy {energy_before:.3} -> {energy_after:.3} ({} moved)",
                if scale_step { " (new level)" } else { "" },
                sweep.moved,
            );

            let snapshot = snake.snapshot();
            on_iteration(&snapshot);
            snapshots.push(snapshot);
            diagnostics.push(IterationDiagnostics {
                iteration: i,
                scale_index,
                scale_step,
                step_size: step,
                energy_before,
                energy_after,
                moved_points: sweep.moved,
                duration: clock.elapsed(&start),
            });
        }

        snake.mark_optimized();
        log::info!("optimization finished, energy {:.3}", snake.energy());
        Ok((snapshots, diagnostics))
    }
}

/// One greedy pass over the control points, scored without touching the
/// snake's caches.
fn sweep(snake: &Snake<'_>, step: u32) -> Result<Sweep, SnakeError> {
    let dims = snake.field().dimensions();
    let step = i32::try_from(step).unwrap_or(i32::MAX);
    let mut points = snake.control_points().to_vec();
    let mut best_energy = snake.total_energy(&points)?;
    let mut moved = 0;

    for i in 0..points.len() {
        let origin = points[i];
        let mut best = None;
        for candidate in candidates(origin, step) {
            if !dims.contains(candidate) {
                continue;
            }
            points[i] = candidate;
            let energy = snake.total_energy(&points)?;
            if energy < best_energy {
                best_energy = energy;
                best = Some(candidate);
            }
        }
        let Some(best) = best else {
            points[i] = origin;
            continue;
        };
        points[i] = best;
        if best != origin {
            moved += 1;
        }
    }

    Ok(Sweep {
        points,
        energy: best_energy,
        moved,
    })
}

/// Stay, then one step down, up, right and left.
fn candidates(origin: ControlPoint, step: i32) -> impl Iterator<Item = ControlPoint> {
    [(0, 0), (0, step), (0, -step), (step, 0), (-step, 0)]
        .into_iter()
        .filter_map(move |(dx, dy)| {
            Some(ControlPoint::new(
                origin.x.checked_add(dx)?,
                origin.y.checked_add(dy)?,
            ))
        })
}
