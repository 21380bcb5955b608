//! The active contour.
//!
//! A [`Snake`] owns an ordered list of control points, borrows an
//! [`EnergyField`] and keeps derived state in sync with the points: the
//! fitted contour, the spline normals and the per-point, per-pair and
//! per-triple energies.
//!
//! Energy evaluation is pure. [`Snake::evaluate`] takes the points to score
//! as a parameter and never touches the caches, so the optimizer can score
//! candidate moves through `&self`. The caches are rebuilt only when the
//! snake itself changes; every mutation sets a dirty flag that
//! [`Snake::refresh`] clears.

use serde::{Deserialize, Serialize};

use crate::energy::{EnergyField, ExternalEnergy};
use crate::profile::curvature_profile;
use crate::spline::SplineCurve;
use crate::types::{ControlPoint, Iteration, Point, SnakeError, Snapshot, Vector, Weights};

/// Everything besides the points that an energy evaluation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyParams {
    /// Preferred distance between adjacent control points.
    pub goal_length: f64,
    /// Internal/external weighting.
    pub weights: Weights,
    /// Evaluate against normals rotated by 180°.
    pub flip: bool,
    /// Position in the optimization run, selecting the scale level.
    pub iteration: Option<Iteration>,
}

impl EnergyParams {
    /// Parameters for a fresh snake: unit weights, no flip and the first
    /// iteration of a one-iteration run.
    #[must_use]
    pub const fn new(goal_length: f64) -> Self {
        Self {
            goal_length,
            weights: Weights {
                inner: 1.0,
                outer: 1.0,
            },
            flip: false,
            iteration: Some(Iteration::FIRST),
        }
    }
}

/// Per-element energies of one point set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evaluation {
    /// One value per adjacent pair.
    pub spacing: Vec<f64>,
    /// One value per consecutive triple.
    pub curvature: Vec<f64>,
    /// One value per point.
    pub external: Vec<f64>,
    /// Weighted total.
    pub total: f64,
}

impl Evaluation {
    /// Sum of the spacing energies.
    #[must_use]
    pub fn spacing_sum(&self) -> f64 {
        self.spacing.iter().sum()
    }

    /// Sum of the curvature energies.
    #[must_use]
    pub fn curvature_sum(&self) -> f64 {
        self.curvature.iter().sum()
    }

    /// Average of the external energies (0 for no points).
    #[must_use]
    pub fn external_mean(&self) -> f64 {
        mean(&self.external)
    }
}

/// `((d / goal) - 1)²` for every adjacent pair.
#[must_use]
pub fn spacing_energies(points: &[ControlPoint], goal_length: f64) -> Vec<f64> {
    points
        .windows(2)
        .map(|pair| {
            let ratio = pair[0].distance(pair[1]) / goal_length - 1.0;
            ratio * ratio
        })
        .collect()
}

/// `1 - cos θ` between the two edges of every consecutive triple.
///
/// A triple with a zero-length edge has no defined angle and contributes
/// 1.0, the value for a right angle.
#[must_use]
pub fn curvature_energies(points: &[ControlPoint]) -> Vec<f64> {
    points
        .windows(3)
        .map(|triple| {
            let a = triple[0].to_point().to(triple[1].to_point());
            let b = triple[1].to_point().to(triple[2].to_point());
            let norms = a.length() * b.length();
            if norms == 0.0 {
                return 1.0;
            }
            (1.0 - a.dot(b) / norms).clamp(0.0, 2.0)
        })
        .collect()
}

/// Upper bound of spacing + curvature in practice: `(n - 1) + 2(n - 2)`.
#[allow(clippy::cast_precision_loss)]
fn internal_max(n: usize) -> f64 {
    let n = n as f64;
    (n - 1.0) + 2.0 * (n - 2.0)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let factor = 1.0 / values.len() as f64;
    values.iter().map(|v| v * factor).sum()
}

/// Score `points` against `field`.
///
/// `normals` must hold one spline normal per point; they are rotated by
/// 180° when `params.flip` is set.
///
/// # Errors
///
/// Returns [`SnakeError::OutOfBounds`] if any point lies outside the image.
pub fn evaluate(
    field: &EnergyField,
    points: &[ControlPoint],
    normals: &[Vector],
    params: &EnergyParams,
) -> Result<Evaluation, SnakeError> {
    debug_assert_eq!(points.len(), normals.len());
    let spacing = spacing_energies(points, params.goal_length);
    let curvature = curvature_energies(points);
    let external = points
        .iter()
        .zip(normals)
        .map(|(&p, &n)| {
            let normal = if params.flip { n.reversed() } else { n };
            field.value_at(p, params.iteration, Some(normal))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let internal: f64 = spacing.iter().sum::<f64>() + curvature.iter().sum::<f64>();
    let limit = internal_max(points.len());
    let scaled_internal = if limit > 0.0 {
        field.maximum() * (internal / limit) * params.weights.inner
    } else {
        0.0
    };
    let total = mean(&external).mul_add(params.weights.outer, scaled_internal);

    Ok(Evaluation {
        spacing,
        curvature,
        external,
        total,
    })
}

/// What a mutation invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Dirty {
    Clean,
    /// Parameters changed; the fitted curve is still valid.
    Energies,
    /// Points changed; refit the curve too.
    Curve,
}

/// An active contour over a shared [`EnergyField`].
#[derive(Debug, Clone)]
pub struct Snake<'a> {
    field: &'a EnergyField,
    control_points: Vec<ControlPoint>,
    params: EnergyParams,
    optimized: bool,
    dirty: Dirty,
    curve: SplineCurve,
    energies: Evaluation,
}

impl<'a> Snake<'a> {
    /// An empty snake.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidGoalLength`] unless `goal_length` is
    /// positive and finite.
    pub fn new(field: &'a EnergyField, goal_length: f64) -> Result<Self, SnakeError> {
        check_goal_length(goal_length)?;
        Ok(Self {
            field,
            control_points: Vec::new(),
            params: EnergyParams::new(goal_length),
            optimized: false,
            dirty: Dirty::Clean,
            curve: SplineCurve::default(),
            energies: Evaluation::default(),
        })
    }

    /// Rebuild a snake from a recorded optimization snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidGoalLength`] or
    /// [`SnakeError::OutOfBounds`] if the snapshot does not fit `field`.
    pub fn restore(
        field: &'a EnergyField,
        goal_length: f64,
        snapshot: &Snapshot,
    ) -> Result<Self, SnakeError> {
        let mut snake = Self::new(field, goal_length)?;
        snake.params.flip = snapshot.flip;
        snake.add_control_points(snapshot.control_points.iter().copied())?;
        Ok(snake)
    }

    /// Append control points and recompute the derived state.
    ///
    /// The snake is left unchanged if any point lies outside the image.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] for the first offending point.
    pub fn add_control_points(
        &mut self,
        points: impl IntoIterator<Item = ControlPoint>,
    ) -> Result<(), SnakeError> {
        let points: Vec<ControlPoint> = points.into_iter().collect();
        let dims = self.field.dimensions();
        for &p in &points {
            dims.check(p)?;
        }
        self.control_points.extend(points);
        self.mark_dirty(Dirty::Curve);
        self.refresh()
    }

    /// Drop every control point and all derived state.
    ///
    /// A full reset also clears the optimized flag.
    pub fn reset(&mut self, full: bool) {
        self.control_points.clear();
        if full {
            self.optimized = false;
        }
        // An empty snake has no curve and zero energy.
        self.curve = SplineCurve::default();
        self.energies = Evaluation::default();
        self.dirty = Dirty::Clean;
    }

    /// Full reset followed by adding `points`, e.g. to copy a reference
    /// snake into an editable one.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if a point lies outside the image.
    pub fn reset_to(&mut self, points: &[ControlPoint]) -> Result<(), SnakeError> {
        self.reset(true);
        self.add_control_points(points.iter().copied())
    }

    /// Replace every control point with the result of an optimizer sweep.
    pub(crate) fn commit(&mut self, points: Vec<ControlPoint>) -> Result<(), SnakeError> {
        self.control_points = points;
        self.mark_dirty(Dirty::Curve);
        self.refresh()
    }

    /// Set the preferred spacing between control points.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidGoalLength`] unless `goal_length` is
    /// positive and finite.
    pub fn set_goal_length(&mut self, goal_length: f64) -> Result<(), SnakeError> {
        check_goal_length(goal_length)?;
        self.params.goal_length = goal_length;
        self.mark_dirty(Dirty::Energies);
        self.refresh()
    }

    /// Set the internal/external weighting.
    ///
    /// # Errors
    ///
    /// Only fails if the snake's own points are out of bounds, which the
    /// mutators prevent.
    pub fn set_weights(&mut self, weights: Weights) -> Result<(), SnakeError> {
        self.params.weights = weights;
        self.mark_dirty(Dirty::Energies);
        self.refresh()
    }

    /// Set the optimization iteration that selects the scale level.
    ///
    /// # Errors
    ///
    /// Only fails if the snake's own points are out of bounds, which the
    /// mutators prevent.
    pub fn set_iteration(&mut self, iteration: Option<Iteration>) -> Result<(), SnakeError> {
        self.params.iteration = iteration;
        self.mark_dirty(Dirty::Energies);
        self.refresh()
    }

    /// Invert the normal orientation used for the external energy.
    ///
    /// # Errors
    ///
    /// Only fails if the snake's own points are out of bounds, which the
    /// mutators prevent.
    pub fn flip_normals(&mut self) -> Result<(), SnakeError> {
        self.params.flip = !self.params.flip;
        self.mark_dirty(Dirty::Energies);
        self.refresh()
    }

    pub(crate) const fn mark_optimized(&mut self) {
        self.optimized = true;
    }

    fn mark_dirty(&mut self, dirty: Dirty) {
        self.dirty = self.dirty.max(dirty);
    }

    /// Recompute the contour, normals and energy caches if anything changed
    /// since the last refresh.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if a control point lies outside
    /// the image.
    pub fn refresh(&mut self) -> Result<(), SnakeError> {
        match self.dirty {
            Dirty::Clean => return Ok(()),
            Dirty::Curve => self.curve = SplineCurve::fit(&self.control_points),
            Dirty::Energies => {}
        }
        self.energies = evaluate(
            self.field,
            &self.control_points,
            self.curve.normals(),
            &self.params,
        )?;
        self.dirty = Dirty::Clean;
        self.check_invariants();
        Ok(())
    }

    fn check_invariants(&self) {
        let n = self.control_points.len();
        debug_assert_eq!(self.curve.normals().len(), n);
        debug_assert_eq!(self.energies.external.len(), n);
        debug_assert_eq!(self.energies.spacing.len(), n.saturating_sub(1));
        debug_assert_eq!(self.energies.curvature.len(), n.saturating_sub(2));
        debug_assert_eq!(self.curve.contour().is_empty(), n < 2);
    }

    /// Score an arbitrary point set under this snake's parameters without
    /// touching its caches.
    ///
    /// The snake's own points reuse the cached spline normals; any other
    /// set gets normals from a fresh fit.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if a point lies outside the image.
    pub fn evaluate(&self, points: &[ControlPoint]) -> Result<Evaluation, SnakeError> {
        if self.dirty == Dirty::Clean && points == self.control_points.as_slice() {
            return evaluate(self.field, points, self.curve.normals(), &self.params);
        }
        let normals = SplineCurve::fit_normals(points);
        evaluate(self.field, points, &normals, &self.params)
    }

    /// Weighted total energy of `points`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if a point lies outside the image.
    pub fn total_energy(&self, points: &[ControlPoint]) -> Result<f64, SnakeError> {
        Ok(self.evaluate(points)?.total)
    }

    /// Spacing energy of `points` under this snake's goal length.
    #[must_use]
    pub fn spacing_energy(&self, points: &[ControlPoint]) -> f64 {
        spacing_energies(points, self.params.goal_length).iter().sum()
    }

    /// Curvature energy of `points`.
    #[must_use]
    pub fn curvature_energy(&self, points: &[ControlPoint]) -> f64 {
        curvature_energies(points).iter().sum()
    }

    /// Average external energy of `points`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if a point lies outside the image.
    pub fn external_energy(&self, points: &[ControlPoint]) -> Result<f64, SnakeError> {
        Ok(self.evaluate(points)?.external_mean())
    }

    /// The energy field this snake is scored against.
    #[must_use]
    pub const fn field(&self) -> &'a EnergyField {
        self.field
    }

    /// Control points, in order.
    #[must_use]
    pub fn control_points(&self) -> &[ControlPoint] {
        &self.control_points
    }

    /// The interpolated contour.
    #[must_use]
    pub fn contour(&self) -> &[Point] {
        self.curve.contour()
    }

    /// Normals for display, rotated by 180° when flipped.
    #[must_use]
    pub fn normals(&self) -> Vec<Vector> {
        self.curve
            .normals()
            .iter()
            .map(|&n| if self.params.flip { n.reversed() } else { n })
            .collect()
    }

    /// Cached external energy per control point.
    #[must_use]
    pub fn external_energies(&self) -> &[f64] {
        &self.energies.external
    }

    /// Cached spacing energy per adjacent pair.
    #[must_use]
    pub fn spacing_energies(&self) -> &[f64] {
        &self.energies.spacing
    }

    /// Cached curvature energy per consecutive triple.
    #[must_use]
    pub fn curvature_energies(&self) -> &[f64] {
        &self.energies.curvature
    }

    /// Cached weighted total energy.
    #[must_use]
    pub const fn energy(&self) -> f64 {
        self.energies.total
    }

    /// Curvature energy spread over the contour samples, for coloring.
    #[must_use]
    pub fn curvature_profile(&self) -> Vec<f64> {
        curvature_profile(
            self.curve.contour(),
            &self.control_points,
            &self.energies.curvature,
        )
    }

    /// Current evaluation parameters.
    #[must_use]
    pub const fn params(&self) -> &EnergyParams {
        &self.params
    }

    /// Preferred spacing between control points.
    #[must_use]
    pub const fn goal_length(&self) -> f64 {
        self.params.goal_length
    }

    /// Internal/external weighting.
    #[must_use]
    pub const fn weights(&self) -> Weights {
        self.params.weights
    }

    /// Whether the normals are flipped.
    #[must_use]
    pub const fn flip(&self) -> bool {
        self.params.flip
    }

    /// The current iteration.
    #[must_use]
    pub const fn iteration(&self) -> Option<Iteration> {
        self.params.iteration
    }

    /// Whether an optimization run has completed since the last full reset.
    #[must_use]
    pub const fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// Whether a mutation is waiting for [`refresh`](Self::refresh).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty != Dirty::Clean
    }

    /// Copy of the current state for rendering or export.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            control_points: self.control_points.clone(),
            contour: self.curve.contour().to_vec(),
            flip: self.params.flip,
            external_energies: self.energies.external.clone(),
        }
    }
}

fn check_goal_length(goal_length: f64) -> Result<(), SnakeError> {
    if goal_length.is_finite() && goal_length > 0.0 {
        Ok(())
    } else {
        Err(SnakeError::InvalidGoalLength(goal_length))
    }
}
