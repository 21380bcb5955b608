//! Interpolating spline through the control points.
//!
//! A [`SplineCurve`] turns the discrete control points of a snake into a
//! dense contour and a unit normal per control point. The curve is an
//! interpolating B-spline of degree `min(3, n - 1)` with chord-length
//! parametrization over `[0, 1]`, the same construction as an
//! interpolating (zero-smoothing) parametric spline fit.
//!
//! # Normals
//!
//! The normal at a control point is found by searching
//! [`SplineCurve::NORMAL_SEARCH_SAMPLES`] uniform parameter values for the
//! curve position closest to the point, evaluating the first derivative
//! there and rotating it by +90°. This is a nearest-sample approximation,
//! not an exact parameter inversion.

use serde::{Deserialize, Serialize};

use crate::types::{ControlPoint, Point, Vector};

/// The contour and normals fitted to a set of control points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SplineCurve {
    contour: Vec<Point>,
    normals: Vec<Vector>,
}

impl SplineCurve {
    /// Normal reported when no curve can be fitted.
    pub const DEFAULT_NORMAL: Vector = Vector::new(1.0, 0.0);

    /// Number of uniform parameter samples searched per normal.
    pub const NORMAL_SEARCH_SAMPLES: usize = 50;

    /// Approximate distance in pixels between contour samples.
    pub const SAMPLE_SPACING: f64 = 10.0;

    /// Fit a curve through `points`.
    ///
    /// With fewer than two points the contour is empty and every point gets
    /// [`DEFAULT_NORMAL`](Self::DEFAULT_NORMAL).
    #[must_use]
    pub fn fit(points: &[ControlPoint]) -> Self {
        let Some(fit) = Fit::new(points) else {
            return Self::degenerate(points);
        };
        Self {
            contour: fit.contour(),
            normals: fit.normals(),
        }
    }

    /// Only the normals of [`fit`](Self::fit), skipping contour sampling.
    #[must_use]
    pub fn fit_normals(points: &[ControlPoint]) -> Vec<Vector> {
        Fit::new(points).map_or_else(
            || vec![Self::DEFAULT_NORMAL; points.len()],
            |fit| fit.normals(),
        )
    }

    fn degenerate(points: &[ControlPoint]) -> Self {
        // Two or more points that all coincide still yield a one-sample
        // contour so that a multi-point snake always has a contour.
        let contour = if points.len() >= 2 {
            vec![points[0].to_point()]
        } else {
            Vec::new()
        };
        Self {
            contour,
            normals: vec![Self::DEFAULT_NORMAL; points.len()],
        }
    }

    /// Dense samples along the curve.
    #[must_use]
    pub fn contour(&self) -> &[Point] {
        &self.contour
    }

    /// Unit normal at each control point.
    #[must_use]
    pub fn normals(&self) -> &[Vector] {
        &self.normals
    }
}

/// A fitted curve plus the data it was fitted to.
struct Fit<'a> {
    points: &'a [ControlPoint],
    /// Curve parameter of each input point (duplicates share a value).
    params: Vec<f64>,
    curve: BSpline,
    derivative: BSpline,
}

impl<'a> Fit<'a> {
    /// `None` when fewer than two distinct points are available.
    fn new(points: &'a [ControlPoint]) -> Option<Self> {
        let mut distinct: Vec<Point> = Vec::with_capacity(points.len());
        let mut params = Vec::with_capacity(points.len());
        let mut length = 0.0;
        for p in points {
            let p = p.to_point();
            match distinct.last() {
                Some(&last) if last == p => {}
                Some(&last) => {
                    length += last.distance(p);
                    distinct.push(p);
                }
                None => distinct.push(p),
            }
            params.push(length);
        }
        if distinct.len() < 2 {
            return None;
        }
        for u in &mut params {
            *u /= length;
        }
        let mut distinct_params = params.clone();
        distinct_params.dedup();

        let degree = 3.min(distinct.len() - 1);
        let curve = BSpline::interpolate(&distinct, &distinct_params, degree)
            .or_else(|| {
                log::debug!("singular spline system at degree {degree}, falling back to linear");
                BSpline::interpolate(&distinct, &distinct_params, 1)
            })?;
        let derivative = curve.derivative();
        Some(Self {
            points,
            params,
            curve,
            derivative,
        })
    }

    fn contour(&self) -> Vec<Point> {
        let mut contour = Vec::new();
        for (pair, u) in self.points.windows(2).zip(self.params.windows(2)) {
            let count = sample_count(pair[0].distance(pair[1]));
            contour.extend(linspace(u[0], u[1], count).map(|t| self.curve.eval(t)));
        }
        contour
    }

    fn normals(&self) -> Vec<Vector> {
        let samples: Vec<(f64, Point)> = linspace(0.0, 1.0, SplineCurve::NORMAL_SEARCH_SAMPLES)
            .map(|t| (t, self.curve.eval(t)))
            .collect();
        let first = self.points[0].to_point();
        self.points
            .iter()
            .map(|cp| {
                let target = cp.to_point();
                let mut best = target.distance(first);
                let mut spot = 0.0;
                for &(t, pos) in &samples {
                    let d = target.distance(pos);
                    if d < best {
                        best = d;
                        spot = t;
                    }
                }
                let tangent = self.derivative.eval(spot);
                Vector::new(tangent.x, tangent.y)
                    .rotated_quarter()
                    .normalized()
                    .unwrap_or(SplineCurve::DEFAULT_NORMAL)
            })
            .collect()
    }
}

/// Samples between two control points `distance` pixels apart.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_count(distance: f64) -> usize {
    ((distance / SplineCurve::SAMPLE_SPACING).round() as usize).max(1)
}

/// `count` evenly spaced values from `start` to `end` inclusive; a single
/// sample yields `start`.
#[allow(clippy::cast_precision_loss)]
fn linspace(start: f64, end: f64, count: usize) -> impl Iterator<Item = f64> {
    let step = if count > 1 {
        (end - start) / (count - 1) as f64
    } else {
        0.0
    };
    (0..count).map(move |i| {
        if i + 1 == count && count > 1 {
            end
        } else {
            (i as f64).mul_add(step, start)
        }
    })
}

/// A clamped B-spline curve in the plane.
#[derive(Debug, Clone)]
struct BSpline {
    degree: usize,
    knots: Vec<f64>,
    coeffs: Vec<Point>,
}

impl BSpline {
    /// Interpolate `points` at strictly increasing `params` in `[0, 1]`.
    ///
    /// Interior knots follow the data parameters (odd degree) or their
    /// midpoints (even degree). Returns `None` for a singular system.
    fn interpolate(points: &[Point], params: &[f64], degree: usize) -> Option<Self> {
        let m = points.len();
        debug_assert_eq!(m, params.len());
        debug_assert!(degree >= 1 && degree < m);

        let mut knots = vec![0.0; degree + 1];
        for j in 0..m - degree - 1 {
            let t = if degree % 2 == 1 {
                params[j + degree.div_ceil(2)]
            } else {
                let a = j + degree / 2;
                f64::midpoint(params[a], params[a + 1])
            };
            knots.push(t);
        }
        knots.extend(std::iter::repeat_n(1.0, degree + 1));

        let shell = Self {
            degree,
            knots,
            coeffs: Vec::new(),
        };
        let mut matrix = Banded::new(m, degree);
        for (i, &u) in params.iter().enumerate() {
            let span = shell.span(u);
            for (r, value) in shell.basis(span, u).into_iter().enumerate() {
                matrix.set(i, span - degree + r, value)?;
            }
        }
        let coeffs = matrix.solve(points.to_vec())?;
        Some(Self { coeffs, ..shell })
    }

    /// Number of basis functions.
    fn len(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// Largest `l` in `[degree, len - 1]` with `knots[l] <= u`.
    fn span(&self, u: f64) -> usize {
        let last = self.len() - 1;
        let below = self.knots[..=last].partition_point(|&k| k <= u);
        below.saturating_sub(1).max(self.degree)
    }

    /// The `degree + 1` non-zero basis values on `span` at `u`.
    fn basis(&self, span: usize, u: f64) -> Vec<f64> {
        let p = self.degree;
        let mut n = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        n[0] = 1.0;
        for j in 1..=p {
            left[j] = u - self.knots[span + 1 - j];
            right[j] = self.knots[span + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                let denom = right[r + 1] + left[j - r];
                let temp = if denom == 0.0 { 0.0 } else { n[r] / denom };
                n[r] = right[r + 1].mul_add(temp, saved);
                saved = left[j - r] * temp;
            }
            n[j] = saved;
        }
        n
    }

    fn eval(&self, u: f64) -> Point {
        let u = u.clamp(0.0, 1.0);
        let span = self.span(u);
        let offset = span - self.degree;
        self.basis(span, u)
            .into_iter()
            .enumerate()
            .fold(Point::new(0.0, 0.0), |acc, (r, b)| {
                let c = self.coeffs[offset + r];
                Point::new(b.mul_add(c.x, acc.x), b.mul_add(c.y, acc.y))
            })
    }

    /// The first-derivative curve, one degree lower.
    #[allow(clippy::cast_precision_loss)]
    fn derivative(&self) -> Self {
        let p = self.degree;
        let coeffs = self
            .coeffs
            .windows(2)
            .enumerate()
            .map(|(i, c)| {
                let span = self.knots[i + p + 1] - self.knots[i + 1];
                if span == 0.0 {
                    return Point::new(0.0, 0.0);
                }
                let f = p as f64 / span;
                Point::new(f * (c[1].x - c[0].x), f * (c[1].y - c[0].y))
            })
            .collect();
        Self {
            degree: p - 1,
            knots: self.knots[1..self.knots.len() - 1].to_vec(),
            coeffs,
        }
    }
}

/// A square matrix with `width` sub- and super-diagonals, stored row by
/// row so that `rows[i][j + width - i]` holds entry `(i, j)`.
///
/// B-spline collocation matrices only have non-zeros within `degree` of
/// the diagonal, so refitting a snake stays linear in its length.
#[derive(Debug, Clone)]
struct Banded {
    width: usize,
    rows: Vec<Vec<f64>>,
}

impl Banded {
    fn new(n: usize, width: usize) -> Self {
        Self {
            width,
            rows: vec![vec![0.0; 2 * width + 1]; n],
        }
    }

    /// Set entry `(i, j)`. `None` if it lies outside the band, which for a
    /// collocation matrix means a zero diagonal and thus a singular system.
    fn set(&mut self, i: usize, j: usize, value: f64) -> Option<()> {
        let offset = (j + self.width).checked_sub(i)?;
        *self.rows.get_mut(i)?.get_mut(offset)? = value;
        Some(())
    }

    /// Solve `self · x = b` for both coordinates at once.
    ///
    /// Elimination runs without pivoting: collocation matrices are totally
    /// positive, and pivoting would widen the band.
    fn solve(mut self, mut b: Vec<Point>) -> Option<Vec<Point>> {
        const SINGULAR: f64 = 1e-12;
        let n = b.len();
        let w = self.width;
        debug_assert_eq!(n, self.rows.len());
        for col in 0..n {
            let pivot = self.rows[col][w];
            if pivot.abs() < SINGULAR {
                return None;
            }
            let last = (col + w).min(n - 1);
            for row in col + 1..=last {
                let (head, tail) = self.rows.split_at_mut(row);
                let (source, target) = (&head[col], &mut tail[0]);
                let factor = target[col + w - row] / pivot;
                if factor == 0.0 {
                    continue;
                }
                for j in col..=last {
                    target[j + w - row] -= factor * source[j + w - col];
                }
                b[row] = Point::new(
                    factor.mul_add(-b[col].x, b[row].x),
                    factor.mul_add(-b[col].y, b[row].y),
                );
            }
        }
        let mut x = vec![Point::new(0.0, 0.0); n];
        for row in (0..n).rev() {
            let band = &self.rows[row];
            let (mut sx, mut sy) = (b[row].x, b[row].y);
            for k in row + 1..=(row + w).min(n - 1) {
                sx -= band[k + w - row] * x[k].x;
                sy -= band[k + w - row] * x[k].y;
            }
            x[row] = Point::new(sx / band[w], sy / band[w]);
        }
        Some(x)
    }
}
