//! Dense `f32` rasters used to hold the scale space.
//!
//! A [`Field`] is a single-channel image stored row-major; a
//! [`VectorField`] pairs two fields holding the x and y components of a
//! gradient. Both support separable correlation with reflective borders
//! and linear range mapping, which is all the scale-space construction
//! needs.

use serde::{Deserialize, Serialize};

use crate::types::{ControlPoint, Dimensions, SnakeError};

/// A single-channel `f32` raster, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Field {
    /// Build a field by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// A field filled with `value`.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap row-major samples.
    ///
    /// Returns `None` if `data.len() != width * height`.
    #[must_use]
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Width and height of the field.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Row-major samples.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Sample at `(x, y)`. Callers guarantee the coordinate is in range.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Sample at a control point.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::OutOfBounds`] if the point is outside the field.
    pub fn at(&self, point: ControlPoint) -> Result<f32, SnakeError> {
        self.dimensions().check(point)?;
        // `check` guarantees both coordinates are non-negative.
        Ok(self.get(point.x.unsigned_abs(), point.y.unsigned_abs()))
    }

    /// Smallest and largest sample, or `None` for an empty field.
    #[must_use]
    pub fn min_max(&self) -> Option<(f32, f32)> {
        min_max(self.data.iter().copied())
    }

    /// Largest sample, or `None` for an empty field.
    #[must_use]
    pub fn max(&self) -> Option<f32> {
        self.min_max().map(|(_, hi)| hi)
    }

    /// Apply `f` to every sample.
    #[must_use]
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two equally-shaped fields sample by sample.
    #[must_use]
    pub fn zip_map(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Self {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Linearly map `[min, max]` of this field onto `[lo, hi]`.
    #[must_use]
    pub fn map_range(&self, lo: f32, hi: f32) -> Self {
        let Some((min, max)) = self.min_max() else {
            return self.clone();
        };
        let f = RangeMap::new(min, max, lo, hi);
        self.map(|v| f.apply(v))
    }

    /// Correlate every row with `kernel` (centered, odd length).
    #[must_use]
    pub fn correlate_rows(&self, kernel: &[f32]) -> Self {
        let w = self.width as usize;
        let mut out = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(w.max(1)) {
            correlate_line(row, kernel, &mut out);
        }
        Self {
            width: self.width,
            height: self.height,
            data: out,
        }
    }

    /// Correlate every column with `kernel` (centered, odd length).
    #[must_use]
    pub fn correlate_columns(&self, kernel: &[f32]) -> Self {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut data = vec![0.0; self.data.len()];
        let mut column = Vec::with_capacity(h);
        let mut filtered = Vec::with_capacity(h);
        for x in 0..w {
            column.clear();
            column.extend((0..h).map(|y| self.data[y * w + x]));
            filtered.clear();
            correlate_line(&column, kernel, &mut filtered);
            for (y, &v) in filtered.iter().enumerate() {
                data[y * w + x] = v;
            }
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Separable correlation: `row_kernel` along x, then `column_kernel`
    /// along y.
    #[must_use]
    pub fn separable(&self, row_kernel: &[f32], column_kernel: &[f32]) -> Self {
        self.correlate_rows(row_kernel)
            .correlate_columns(column_kernel)
    }
}

/// A two-component vector field (x and y gradient components).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    x: Field,
    y: Field,
}

impl VectorField {
    /// Pair two equally-shaped component fields.
    ///
    /// Returns `None` if the shapes differ.
    #[must_use]
    pub fn new(x: Field, y: Field) -> Option<Self> {
        (x.dimensions() == y.dimensions()).then_some(Self { x, y })
    }

    /// Pair components derived from the same source field.
    pub(crate) fn from_same_shape(x: Field, y: Field) -> Self {
        debug_assert_eq!(x.dimensions(), y.dimensions());
        Self { x, y }
    }

    /// Width and height of the field.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.x.dimensions()
    }

    /// The x component.
    #[must_use]
    pub const fn x(&self) -> &Field {
        &self.x
    }

    /// The y component.
    #[must_use]
    pub const fn y(&self) -> &Field {
        &self.y
    }

    /// Per-pixel Euclidean length.
    #[must_use]
    pub fn magnitude(&self) -> Field {
        self.x.zip_map(&self.y, f32::hypot)
    }

    /// Linearly map both components onto `[lo, hi]` using their joint
    /// minimum and maximum.
    #[must_use]
    pub fn map_range(&self, lo: f32, hi: f32) -> Self {
        let joint = min_max(
            self.x
                .as_slice()
                .iter()
                .chain(self.y.as_slice())
                .copied(),
        );
        let Some((min, max)) = joint else {
            return self.clone();
        };
        let f = RangeMap::new(min, max, lo, hi);
        Self {
            x: self.x.map(|v| f.apply(v)),
            y: self.y.map(|v| f.apply(v)),
        }
    }
}

/// Affine map from `[min, max]` onto `[lo, hi]`.
#[derive(Debug, Clone, Copy)]
struct RangeMap {
    min: f32,
    scale: f32,
    lo: f32,
    hi: f32,
}

impl RangeMap {
    fn new(min: f32, max: f32, lo: f32, hi: f32) -> Self {
        let span = max - min;
        let scale = if span > 0.0 { (hi - lo) / span } else { 0.0 };
        Self { min, scale, lo, hi }
    }

    fn apply(self, v: f32) -> f32 {
        if self.scale == 0.0 {
            // Constant input: the point of the target range nearest zero.
            return 0.0_f32.clamp(self.lo, self.hi);
        }
        (v - self.min)
            .mul_add(self.scale, self.lo)
            .clamp(self.lo, self.hi)
    }
}

fn min_max(values: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Mirror `i` into `[0, n)` without repeating the edge sample
/// (`... 2 1 | 0 1 2 ... n-1 | n-2 ...`).
fn reflect(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n.cast_signed();
    let period = 2 * (n - 1);
    let r = i.rem_euclid(period);
    let r = if r >= n { period - r } else { r };
    r.unsigned_abs()
}

/// Mirrored taps are summed pairwise before accumulating, so an
/// antisymmetric kernel gives exactly zero on flat input.
#[allow(clippy::suboptimal_flops)]
fn correlate_line(input: &[f32], kernel: &[f32], out: &mut Vec<f32>) {
    let n = input.len();
    let radius = kernel.len() / 2;
    for i in 0..n {
        let center = i.cast_signed();
        let mut acc = kernel[radius] * input[i];
        for k in 1..=radius {
            let d = k.cast_signed();
            let before = input[reflect(center - d, n)];
            let after = input[reflect(center + d, n)];
            acc += kernel[radius - k] * before + kernel[radius + k] * after;
        }
        out.push(acc);
    }
}
