//! External (image) energy.
//!
//! Three interchangeable variants turn a [`SourceImage`] into an energy
//! landscape that the snake minimizes:
//!
//! - [`IntensityEnergy`]: the raw pixel value. Dark regions attract.
//! - [`GradientMagnitudeEnergy`]: inverted gradient magnitude over a
//!   scale space. Strong edges attract.
//! - [`GradientDirectionEnergy`]: penalizes control points whose normal
//!   points against the gradient vector over a scale space, so the snake
//!   settles on edges of one polarity.
//!
//! Variants are chosen by [`EnergyKind`], either directly or through the
//! name registry ([`EnergyKind::from_str`](std::str::FromStr)).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::blur::smooth_field;
use crate::field::{Field, VectorField};
use crate::gradient::{gaussian_gradient, gradient_magnitude};
use crate::schedule::{DEFAULT_STEP_SIZE, ScaleSchedule};
use crate::source::SourceImage;
use crate::types::{ControlPoint, Dimensions, Iteration, SnakeConfig, SnakeError, Vector};

/// Selects which external energy to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyKind {
    /// Raw pixel intensity.
    Intensity,
    /// Inverted gradient magnitude over a scale space.
    GradientMagnitude,
    /// Gradient direction against the contour normal over a scale space.
    #[default]
    GradientDirection,
}

impl EnergyKind {
    /// Every registered variant, in registry order.
    pub const ALL: [Self; 3] = [
        Self::Intensity,
        Self::GradientMagnitude,
        Self::GradientDirection,
    ];

    /// Registry name of the variant.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Intensity => "IntensityEnergy",
            Self::GradientMagnitude => "GradientMagnitudeEnergy",
            Self::GradientDirection => "GradientDirectionEnergy",
        }
    }

    /// Registry names of all variants.
    #[must_use]
    pub fn names() -> [&'static str; 3] {
        Self::ALL.map(Self::name)
    }

    /// Build the energy field for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidResolution`] for `resolution == 0`,
    /// [`SnakeError::InvalidSigma`] for a non-positive `base_sigma` and
    /// [`SnakeError::DegenerateImage`] when the image yields no positive
    /// energy maximum.
    pub fn build(
        self,
        image: &SourceImage,
        resolution: usize,
        base_sigma: f32,
    ) -> Result<EnergyField, SnakeError> {
        let field = match self {
            Self::Intensity => EnergyField::Intensity(IntensityEnergy::new(image)?),
            Self::GradientMagnitude => EnergyField::GradientMagnitude(
                GradientMagnitudeEnergy::new(image, resolution, base_sigma)?,
            ),
            Self::GradientDirection => EnergyField::GradientDirection(
                GradientDirectionEnergy::new(image, resolution, base_sigma)?,
            ),
        };
        Ok(field)
    }
}

impl fmt::Display for EnergyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnergyKind {
    type Err = SnakeError;

    /// Accepts registry names (`"GradientMagnitudeEnergy"`) and variant
    /// names (`"GradientMagnitude"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| {
                let name = kind.name();
                s == name || Some(s) == name.strip_suffix("Energy")
            })
            .ok_or_else(|| SnakeError::UnknownEnergy(s.to_string()))
    }
}

/// Capabilities shared by every external energy.
pub trait ExternalEnergy {
    /// Upper bound of every energy value; always positive.
    fn maximum(&self) -> f64;

    /// Shape of the underlying image.
    fn dimensions(&self) -> Dimensions;

    /// Energy at an in-bounds point, in `[0, maximum]`.
    ///
    /// Callers go through [`value_at`](Self::value_at), which checks bounds.
    fn energy(
        &self,
        point: ControlPoint,
        iteration: Option<Iteration>,
        normal: Option<Vector>,
    ) -> f64;

    /// Suggested per-axis step size for the optimizer.
    fn step_size(&self, iteration: Option<Iteration>) -> u32;

    /// Scale-space level used at `iteration` (0 without one).
    fn scale_index(&self, iteration: Option<Iteration>) -> usize;

    /// Returns `true` when `iteration` just moved to a new level.
    fn is_scale_step(&self, iteration: Iteration) -> bool;

    /// Energy at `point`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if `point` is outside the image.
    fn value_at(
        &self,
        point: ControlPoint,
        iteration: Option<Iteration>,
        normal: Option<Vector>,
    ) -> Result<f64, SnakeError> {
        self.dimensions().check(point)?;
        let energy = self.energy(point, iteration, normal);
        debug_assert!(
            energy.is_finite() && (0.0..=self.maximum()).contains(&energy),
            "energy {energy} at {point:?} outside [0, {}]",
            self.maximum()
        );
        Ok(energy)
    }
}

/// Reads a field at a point already checked by [`ExternalEnergy::value_at`].
fn sample(field: &Field, point: ControlPoint) -> f64 {
    f64::from(field.get(point.x.unsigned_abs(), point.y.unsigned_abs()))
}

/// The pixel value is the energy.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityEnergy {
    image: Field,
    maximum: f64,
}

impl IntensityEnergy {
    /// Build from the scalar view of `image`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::DegenerateImage`] if the brightest pixel is
    /// not positive.
    pub fn new(image: &SourceImage) -> Result<Self, SnakeError> {
        let image = image.scalar();
        let maximum = positive_peak(&image)?;
        Ok(Self {
            image,
            maximum: f64::from(maximum),
        })
    }
}

impl ExternalEnergy for IntensityEnergy {
    fn maximum(&self) -> f64 {
        self.maximum
    }

    fn dimensions(&self) -> Dimensions {
        self.image.dimensions()
    }

    fn energy(&self, point: ControlPoint, _: Option<Iteration>, _: Option<Vector>) -> f64 {
        sample(&self.image, point).clamp(0.0, self.maximum)
    }

    fn step_size(&self, _: Option<Iteration>) -> u32 {
        DEFAULT_STEP_SIZE
    }

    fn scale_index(&self, _: Option<Iteration>) -> usize {
        0
    }

    fn is_scale_step(&self, _: Iteration) -> bool {
        false
    }
}

/// Inverted gradient magnitude over a scale space.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientMagnitudeEnergy {
    schedule: ScaleSchedule,
    levels: Vec<Field>,
    maximum: f64,
}

impl GradientMagnitudeEnergy {
    /// Build `resolution` levels: the gradient magnitude at `base_sigma`,
    /// then increasingly smoothed copies of it. Every level is range-mapped
    /// to `[0, max(image)]`.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidResolution`], [`SnakeError::InvalidSigma`]
    /// or [`SnakeError::DegenerateImage`].
    pub fn new(image: &SourceImage, resolution: usize, base_sigma: f32) -> Result<Self, SnakeError> {
        let schedule = ScaleSchedule::new(resolution, base_sigma)?;
        let scalar = image.scalar();
        let peak = positive_peak(&scalar)?;

        let base = gradient_magnitude(&scalar, base_sigma).map_range(0.0, peak);
        log::debug!("gradient magnitude level 0 (sigma={base_sigma})");
        let mut levels = Vec::with_capacity(resolution);
        for &sigma in &schedule.scales()[1..] {
            log::debug!("gradient magnitude level {} (sigma={sigma})", levels.len() + 1);
            levels.push(smooth_field(&base, sigma).map_range(0.0, peak));
        }
        levels.insert(0, base);

        let peak = f64::from(peak);
        Ok(Self {
            schedule,
            levels,
            maximum: peak * peak,
        })
    }

    /// The scale schedule.
    #[must_use]
    pub const fn schedule(&self) -> &ScaleSchedule {
        &self.schedule
    }
}

impl ExternalEnergy for GradientMagnitudeEnergy {
    fn maximum(&self) -> f64 {
        self.maximum
    }

    fn dimensions(&self) -> Dimensions {
        self.levels[0].dimensions()
    }

    fn energy(&self, point: ControlPoint, iteration: Option<Iteration>, _: Option<Vector>) -> f64 {
        let energy = match iteration {
            None => {
                let last = &self.levels[self.levels.len() - 1];
                self.maximum - sample(last, point)
            }
            Some(it) => {
                let v = sample(&self.levels[self.schedule.scale_index(it)], point);
                v.mul_add(-v, self.maximum)
            }
        };
        energy.clamp(0.0, self.maximum)
    }

    fn step_size(&self, iteration: Option<Iteration>) -> u32 {
        self.schedule.step_size(iteration)
    }

    fn scale_index(&self, iteration: Option<Iteration>) -> usize {
        iteration.map_or(0, |it| self.schedule.scale_index(it))
    }

    fn is_scale_step(&self, iteration: Iteration) -> bool {
        self.schedule.is_scale_step(iteration)
    }
}

/// Penalizes normals pointing against the image gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDirectionEnergy {
    schedule: ScaleSchedule,
    levels: Vec<VectorField>,
}

impl GradientDirectionEnergy {
    /// Fixed energy maximum of the direction variant.
    pub const MAXIMUM: f64 = 30_000.0;

    /// Gradient components are range-mapped onto `[-BOUND, BOUND]`.
    pub const BOUND: f32 = 125.0;

    /// Build `resolution` gradient vector fields of the first channel of
    /// `image`, one per σ of the schedule.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidResolution`] or
    /// [`SnakeError::InvalidSigma`].
    pub fn new(image: &SourceImage, resolution: usize, base_sigma: f32) -> Result<Self, SnakeError> {
        let schedule = ScaleSchedule::new(resolution, base_sigma)?;
        let channel = image.first_channel();
        let levels = schedule
            .scales()
            .iter()
            .enumerate()
            .map(|(i, &sigma)| {
                log::debug!("gradient direction level {i} (sigma={sigma})");
                gaussian_gradient(channel, sigma).map_range(-Self::BOUND, Self::BOUND)
            })
            .collect();
        Ok(Self { schedule, levels })
    }

    /// The scale schedule.
    #[must_use]
    pub const fn schedule(&self) -> &ScaleSchedule {
        &self.schedule
    }
}

impl ExternalEnergy for GradientDirectionEnergy {
    fn maximum(&self) -> f64 {
        Self::MAXIMUM
    }

    fn dimensions(&self) -> Dimensions {
        self.levels[0].dimensions()
    }

    fn energy(
        &self,
        point: ControlPoint,
        iteration: Option<Iteration>,
        normal: Option<Vector>,
    ) -> f64 {
        let Some(normal) = normal else {
            return Self::MAXIMUM;
        };
        let level = &self.levels[self.scale_index(iteration)];
        let gradient = Vector::new(sample(level.x(), point), sample(level.y(), point));
        let dot = normal.dot(gradient);
        if dot < 0.0 {
            dot.mul_add(-dot, Self::MAXIMUM).max(0.0)
        } else {
            Self::MAXIMUM
        }
    }

    fn step_size(&self, iteration: Option<Iteration>) -> u32 {
        self.schedule.step_size(iteration)
    }

    fn scale_index(&self, iteration: Option<Iteration>) -> usize {
        iteration.map_or(0, |it| self.schedule.scale_index(it))
    }

    fn is_scale_step(&self, iteration: Iteration) -> bool {
        self.schedule.is_scale_step(iteration)
    }
}

/// A built external energy of any variant.
///
/// Immutable once built; snakes borrow it, so several snakes can share
/// one field.
#[derive(Debug, Clone, PartialEq)]
pub enum EnergyField {
    /// See [`IntensityEnergy`].
    Intensity(IntensityEnergy),
    /// See [`GradientMagnitudeEnergy`].
    GradientMagnitude(GradientMagnitudeEnergy),
    /// See [`GradientDirectionEnergy`].
    GradientDirection(GradientDirectionEnergy),
}

impl EnergyField {
    /// Look up `name` in the registry and build that variant.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::UnknownEnergy`] for an unregistered name, or
    /// any error of [`EnergyKind::build`].
    pub fn from_name(
        name: &str,
        image: &SourceImage,
        config: &SnakeConfig,
    ) -> Result<Self, SnakeError> {
        name.parse::<EnergyKind>()?
            .build(image, config.scale_space_depth, config.base_sigma)
    }

    /// Build the variant, depth and base σ named by `config`.
    ///
    /// # Errors
    ///
    /// Any error of [`EnergyKind::build`].
    pub fn from_config(image: &SourceImage, config: &SnakeConfig) -> Result<Self, SnakeError> {
        config
            .energy
            .build(image, config.scale_space_depth, config.base_sigma)
    }

    /// Which variant this is.
    #[must_use]
    pub const fn kind(&self) -> EnergyKind {
        match self {
            Self::Intensity(_) => EnergyKind::Intensity,
            Self::GradientMagnitude(_) => EnergyKind::GradientMagnitude,
            Self::GradientDirection(_) => EnergyKind::GradientDirection,
        }
    }

    /// The scale schedule, if the variant has a scale space.
    #[must_use]
    pub const fn schedule(&self) -> Option<&ScaleSchedule> {
        match self {
            Self::Intensity(_) => None,
            Self::GradientMagnitude(e) => Some(e.schedule()),
            Self::GradientDirection(e) => Some(e.schedule()),
        }
    }

    fn inner(&self) -> &dyn ExternalEnergy {
        match self {
            Self::Intensity(e) => e,
            Self::GradientMagnitude(e) => e,
            Self::GradientDirection(e) => e,
        }
    }
}

impl ExternalEnergy for EnergyField {
    fn maximum(&self) -> f64 {
        self.inner().maximum()
    }

    fn dimensions(&self) -> Dimensions {
        self.inner().dimensions()
    }

    fn energy(
        &self,
        point: ControlPoint,
        iteration: Option<Iteration>,
        normal: Option<Vector>,
    ) -> f64 {
        self.inner().energy(point, iteration, normal)
    }

    fn step_size(&self, iteration: Option<Iteration>) -> u32 {
        self.inner().step_size(iteration)
    }

    fn scale_index(&self, iteration: Option<Iteration>) -> usize {
        self.inner().scale_index(iteration)
    }

    fn is_scale_step(&self, iteration: Iteration) -> bool {
        self.inner().is_scale_step(iteration)
    }
}

fn positive_peak(field: &Field) -> Result<f32, SnakeError> {
    match field.max() {
        Some(peak) if peak > 0.0 && peak.is_finite() => Ok(peak),
        _ => Err(SnakeError::DegenerateImage),
    }
}
