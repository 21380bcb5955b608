//! Shared types for the snakeisland active contour engine.

use serde::{Deserialize, Serialize};

use crate::energy::EnergyKind;

/// An integer pixel coordinate placed by the user or moved by the optimizer.
///
/// Serialized as a two-element array `[x, y]`, which is the layout of the
/// persisted snake format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct ControlPoint {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl ControlPoint {
    /// Create a new control point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this point shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The point as floating-point coordinates.
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    /// Euclidean distance to another control point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.to_point().distance(other.to_point())
    }
}

impl From<[i32; 2]> for ControlPoint {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<ControlPoint> for [i32; 2] {
    fn from(p: ControlPoint) -> Self {
        [p.x, p.y]
    }
}

impl From<(i32, i32)> for ControlPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// The vector pointing from `self` to `other`.
    #[must_use]
    pub fn to(self, other: Self) -> Vector {
        Vector::new(other.x - self.x, other.y - self.y)
    }
}

/// A 2D direction vector (spline derivatives and contour normals).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
}

impl Vector {
    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Dot product with another vector.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Rotated by +90° (counter-clockwise in a y-up frame).
    #[must_use]
    pub fn rotated_quarter(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotated by 180°.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self::new(-self.x, -self.y)
    }

    /// Unit vector in the same direction, or `None` for a zero-length
    /// (or non-finite) vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        (len > 0.0 && len.is_finite()).then(|| Self::new(self.x / len, self.y / len))
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Returns `true` if `point` lies inside `[0, width) x [0, height)`.
    #[must_use]
    pub fn contains(self, point: ControlPoint) -> bool {
        u32::try_from(point.x).is_ok_and(|x| x < self.width)
            && u32::try_from(point.y).is_ok_and(|y| y < self.height)
    }

    /// Rejects `point` with [`SnakeError::OutOfBounds`] when it lies outside
    /// the image.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if the point is not contained.
    pub fn check(self, point: ControlPoint) -> Result<(), SnakeError> {
        if self.contains(point) {
            Ok(())
        } else {
            Err(SnakeError::OutOfBounds {
                x: point.x,
                y: point.y,
                width: self.width,
                height: self.height,
            })
        }
    }
}

/// Position within an optimization run: iteration `current` of `total`
/// (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    total: u32,
    current: u32,
}

impl Iteration {
    /// The only iteration of a one-iteration run.
    pub const FIRST: Self = Self {
        total: 1,
        current: 1,
    };

    /// Create an iteration marker.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidIteration`] unless
    /// `0 < current <= total`.
    pub const fn new(total: u32, current: u32) -> Result<Self, SnakeError> {
        if current == 0 || current > total {
            return Err(SnakeError::InvalidIteration { total, current });
        }
        Ok(Self { total, current })
    }

    /// Total number of iterations in the run.
    #[must_use]
    pub const fn total(self) -> u32 {
        self.total
    }

    /// The current iteration, starting at 1.
    #[must_use]
    pub const fn current(self) -> u32 {
        self.current
    }

    /// Returns `true` for the first iteration of a run.
    #[must_use]
    pub const fn is_first(self) -> bool {
        self.current == 1
    }
}

/// Relative weighting of internal (shape) and external (image) energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Weight of the rescaled spacing + curvature energy.
    pub inner: f64,
    /// Weight of the averaged external energy.
    pub outer: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            inner: 1.0,
            outer: 1.0,
        }
    }
}

/// The state of a snake after one optimization iteration.
///
/// Handed to rendering/export collaborators; one is recorded per
/// iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Control points after the iteration's sweep.
    #[serde(rename = "controlpoints")]
    pub control_points: Vec<ControlPoint>,
    /// Interpolated contour through the control points.
    pub contour: Vec<Point>,
    /// Whether the normals were flipped.
    pub flip: bool,
    /// External energy at each control point.
    #[serde(rename = "externalEnergies")]
    pub external_energies: Vec<f64>,
}

/// Configuration for building an energy field and optimizing a snake.
///
/// All parameters default to a typical coastline tracing
/// setup. [`validate`](Self::validate) checks the invariants that the
/// engine relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnakeConfig {
    /// Which external energy variant to build.
    pub energy: EnergyKind,

    /// Number of scale-space levels (R).
    pub scale_space_depth: usize,

    /// Gaussian sigma of the finest scale-space level (σ0).
    pub base_sigma: f32,

    /// Preferred distance between adjacent control points, in pixels.
    pub goal_length: f64,

    /// Number of greedy sweeps to run.
    pub optimization_steps: u32,

    /// Weight of the internal (spacing + curvature) energy.
    pub inner_weight: f64,

    /// Weight of the external (image) energy.
    pub outer_weight: f64,

    /// Pins the per-axis step size instead of following the scale schedule.
    pub fixed_step_size: Option<u32>,

    /// Gaussian sigma applied to the decoded raster before the energy field
    /// is built. Non-positive values disable the pre-blur.
    pub pre_blur_sigma: f32,
}

impl SnakeConfig {
    /// Default external energy variant.
    pub const DEFAULT_ENERGY: EnergyKind = EnergyKind::GradientDirection;
    /// Default scale-space depth.
    pub const DEFAULT_SCALE_SPACE_DEPTH: usize = 5;
    /// Default base sigma.
    pub const DEFAULT_BASE_SIGMA: f32 = 6.0;
    /// Default goal length in pixels.
    pub const DEFAULT_GOAL_LENGTH: f64 = 100.0;
    /// Default number of optimization sweeps.
    pub const DEFAULT_OPTIMIZATION_STEPS: u32 = 15;
    /// Default inner and outer weight.
    pub const DEFAULT_WEIGHT: f64 = 1.0;
    /// Default pre-blur sigma (disabled).
    pub const DEFAULT_PRE_BLUR_SIGMA: f32 = 0.0;

    /// The configured weights.
    #[must_use]
    pub const fn weights(&self) -> Weights {
        Weights {
            inner: self.inner_weight,
            outer: self.outer_weight,
        }
    }

    /// Check the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::InvalidConfig`] describing the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SnakeError> {
        if self.scale_space_depth == 0 {
            return Err(SnakeError::InvalidConfig(
                "scale_space_depth must be at least 1".to_string(),
            ));
        }
        if !(self.base_sigma.is_finite() && self.base_sigma > 0.0) {
            return Err(SnakeError::InvalidConfig(format!(
                "base_sigma must be positive, got {}",
                self.base_sigma
            )));
        }
        if !(self.goal_length.is_finite() && self.goal_length > 0.0) {
            return Err(SnakeError::InvalidConfig(format!(
                "goal_length must be positive, got {}",
                self.goal_length
            )));
        }
        if !(self.inner_weight.is_finite() && self.outer_weight.is_finite()) {
            return Err(SnakeError::InvalidConfig(
                "weights must be finite".to_string(),
            ));
        }
        if self.fixed_step_size == Some(0) {
            return Err(SnakeError::InvalidConfig(
                "fixed_step_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            energy: Self::DEFAULT_ENERGY,
            scale_space_depth: Self::DEFAULT_SCALE_SPACE_DEPTH,
            base_sigma: Self::DEFAULT_BASE_SIGMA,
            goal_length: Self::DEFAULT_GOAL_LENGTH,
            optimization_steps: Self::DEFAULT_OPTIMIZATION_STEPS,
            inner_weight: Self::DEFAULT_WEIGHT,
            outer_weight: Self::DEFAULT_WEIGHT,
            fixed_step_size: None,
            pre_blur_sigma: Self::DEFAULT_PRE_BLUR_SIGMA,
        }
    }
}

/// Errors that can occur while building energy fields or optimizing snakes.
#[derive(Debug, thiserror::Error)]
pub enum SnakeError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Channels of a multi-channel image have different shapes.
    #[error("image channels must all have the same dimensions")]
    ChannelMismatch,

    /// The scale-space resolution was zero.
    #[error("scale space resolution must be at least 1")]
    InvalidResolution,

    /// A Gaussian sigma was not positive and finite.
    #[error("sigma must be positive and finite, got {0}")]
    InvalidSigma(f32),

    /// The goal length was not positive and finite.
    #[error("goal length must be positive and finite, got {0}")]
    InvalidGoalLength(f64),

    /// An iteration marker outside `0 < current <= total`.
    #[error("iteration {current} is outside 1..={total}")]
    InvalidIteration {
        /// Total iterations of the run.
        total: u32,
        /// The offending current iteration.
        current: u32,
    },

    /// A coordinate outside the image.
    #[error("coordinate ({x}, {y}) is outside the {width}x{height} image")]
    OutOfBounds {
        /// Horizontal coordinate.
        x: i32,
        /// Vertical coordinate.
        y: i32,
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// The image yields a non-positive energy maximum (e.g. all black).
    #[error("image has no positive intensity to derive an energy maximum from")]
    DegenerateImage,

    /// No external energy is registered under the given name.
    #[error("unknown external energy: {0}")]
    UnknownEnergy(String),

    /// Configuration is invalid.
    #[error("invalid snake configuration: {0}")]
    InvalidConfig(String),

    /// The two sampling endpoints do not lie on the same line string.
    #[error("the coordinates are not within the same line string")]
    NotOnSameLine,

    /// Sampling produced no usable control points.
    #[error("no control points produced")]
    NoControlPoints,

    /// A persisted snake could not be read or written.
    #[error("snake file error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- ControlPoint tests ---

    #[test]
    fn control_point_offset() {
        let p = ControlPoint::new(3, 4).offset(-3, 6);
        assert_eq!(p, ControlPoint::new(0, 10));
    }

    #[test]
    fn control_point_distance() {
        let a = ControlPoint::new(0, 0);
        let b = ControlPoint::new(3, 4);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn control_point_serializes_as_pair() {
        let json = serde_json::to_string(&ControlPoint::new(12, -7)).unwrap();
        assert_eq!(json, "[12,-7]");
        let back: ControlPoint = serde_json::from_str("[5,9]").unwrap();
        assert_eq!(back, ControlPoint::new(5, 9));
    }

    #[test]
    fn control_point_rejects_triples() {
        let result: Result<ControlPoint, _> = serde_json::from_str("[1,2,3]");
        assert!(result.is_err());
    }

    // --- Vector tests ---

    #[test]
    fn vector_rotation_is_counter_clockwise() {
        let v = Vector::new(1.0, 0.0).rotated_quarter();
        assert!((v.x - 0.0).abs() < f64::EPSILON);
        assert!((v.y - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vector_normalized_has_unit_length() {
        let v = Vector::new(3.0, 4.0).normalized().unwrap();
        assert!((v.length() - 1.0).abs() < 1e-12);
        assert!((v.x - 0.6).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Vector::new(0.0, 0.0).normalized().is_none());
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_contains_edges() {
        let d = Dimensions {
            width: 10,
            height: 5,
        };
        assert!(d.contains(ControlPoint::new(0, 0)));
        assert!(d.contains(ControlPoint::new(9, 4)));
        assert!(!d.contains(ControlPoint::new(10, 4)));
        assert!(!d.contains(ControlPoint::new(9, 5)));
        assert!(!d.contains(ControlPoint::new(-1, 0)));
    }

    #[test]
    fn dimensions_check_reports_coordinates() {
        let d = Dimensions {
            width: 10,
            height: 5,
        };
        let err = d.check(ControlPoint::new(12, 1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "coordinate (12, 1) is outside the 10x5 image"
        );
    }

    // --- Iteration tests ---

    #[test]
    fn iteration_bounds() {
        assert!(Iteration::new(10, 0).is_err());
        assert!(Iteration::new(10, 11).is_err());
        let it = Iteration::new(10, 1).unwrap();
        assert!(it.is_first());
        assert_eq!(it.total(), 10);
    }

    // --- SnakeConfig tests ---

    #[test]
    fn config_defaults() {
        let config = SnakeConfig::default();
        assert_eq!(config.energy, EnergyKind::GradientDirection);
        assert_eq!(config.scale_space_depth, 5);
        assert!((config.base_sigma - 6.0).abs() < f32::EPSILON);
        assert!((config.goal_length - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.optimization_steps, 15);
        assert_eq!(config.weights(), Weights::default());
        assert!(config.fixed_step_size.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_values() {
        let zero_depth = SnakeConfig {
            scale_space_depth: 0,
            ..SnakeConfig::default()
        };
        assert!(matches!(
            zero_depth.validate(),
            Err(SnakeError::InvalidConfig(_))
        ));

        let negative_goal = SnakeConfig {
            goal_length: -1.0,
            ..SnakeConfig::default()
        };
        assert!(negative_goal.validate().is_err());

        let zero_step = SnakeConfig {
            fixed_step_size: Some(0),
            ..SnakeConfig::default()
        };
        assert!(zero_step.validate().is_err());
    }

    #[test]
    fn config_partial_json_uses_defaults() {
        let config: SnakeConfig =
            serde_json::from_str(r#"{"energy":"GradientMagnitude","goal_length":40.0}"#).unwrap();
        assert_eq!(config.energy, EnergyKind::GradientMagnitude);
        assert!((config.goal_length - 40.0).abs() < f64::EPSILON);
        assert_eq!(config.scale_space_depth, 5);
    }

    #[test]
    fn snapshot_uses_persisted_key_names() {
        let snapshot = Snapshot {
            control_points: vec![ControlPoint::new(1, 2)],
            contour: vec![],
            flip: true,
            external_energies: vec![0.5],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"controlpoints\":[[1,2]]"));
        assert!(json.contains("\"externalEnergies\":[0.5]"));
    }

    // --- SnakeError tests ---

    #[test]
    fn error_display() {
        assert_eq!(
            SnakeError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            SnakeError::UnknownEnergy("Foo".to_string()).to_string(),
            "unknown external energy: Foo"
        );
        assert_eq!(
            SnakeError::InvalidIteration {
                total: 3,
                current: 4
            }
            .to_string(),
            "iteration 4 is outside 1..=3"
        );
    }
}
