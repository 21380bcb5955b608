//! Gaussian derivative filters.
//!
//! The gradient at scale σ is the image correlated with the first
//! derivative of a Gaussian along one axis and the Gaussian itself along
//! the other. Derivative weights are normalized so a unit ramp has slope 1,
//! which keeps responses comparable across scales before range mapping.

use crate::blur::{gaussian_kernel, gaussian_weights, kernel_radius};
use crate::field::{Field, VectorField};

/// 1D first-derivative-of-Gaussian kernel for offsets `-r..=r`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn derivative_kernel(sigma: f32) -> Vec<f32> {
    let radius = kernel_radius(sigma).cast_signed();
    let g = gaussian_weights(sigma);
    let offsets = (-radius..=radius).map(|d| d as f32);
    let moment: f32 = offsets.clone().zip(&g).map(|(d, &w)| d * d * w).sum();
    offsets.zip(&g).map(|(d, &w)| d * w / moment).collect()
}

/// Gaussian gradient `(∂x, ∂y)` of `field` at scale `sigma`.
#[must_use = "returns the gradient field"]
pub fn gaussian_gradient(field: &Field, sigma: f32) -> VectorField {
    let smooth = gaussian_kernel(sigma);
    let derivative = derivative_kernel(sigma);
    let gx = field.separable(&derivative, &smooth);
    let gy = field.separable(&smooth, &derivative);
    VectorField::from_same_shape(gx, gy)
}

/// Gaussian gradient magnitude of `field` at scale `sigma`.
#[must_use = "returns the gradient magnitude"]
pub fn gradient_magnitude(field: &Field, sigma: f32) -> Field {
    gaussian_gradient(field, sigma).magnitude()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn ramp_x(width: u32, height: u32, slope: f32) -> Field {
        Field::from_fn(width, height, |x, _| x as f32 * slope)
    }

    #[test]
    fn derivative_kernel_is_antisymmetric() {
        let k = derivative_kernel(1.5);
        let n = k.len();
        assert!(k[n / 2].abs() < f32::EPSILON);
        for i in 0..n / 2 {
            assert!((k[i] + k[n - 1 - i]).abs() < 1e-7);
        }
        assert!(k[n - 1] > 0.0);
    }

    #[test]
    fn ramp_has_unit_slope_in_interior() {
        let field = ramp_x(40, 10, 1.0);
        let grad = gaussian_gradient(&field, 2.0);
        assert!((grad.x().get(20, 5) - 1.0).abs() < 1e-4);
        assert!(grad.y().get(20, 5).abs() < 1e-4);
    }

    #[test]
    fn vertical_ramp_is_along_y() {
        #[allow(clippy::cast_precision_loss)]
        let field = Field::from_fn(10, 40, |_, y| 2.0 * y as f32);
        let grad = gaussian_gradient(&field, 2.0);
        assert!(grad.x().get(5, 20).abs() < 1e-4);
        assert!((grad.y().get(5, 20) - 2.0).abs() < 1e-3);
    }

    #[test]
    fn constant_field_has_exactly_zero_gradient() {
        for value in [100.0, 50.0, 0.3] {
            let grad = gaussian_gradient(&Field::filled(15, 15, value), 3.0);
            assert!(grad.x().as_slice().iter().all(|&v| v == 0.0), "{value}");
            assert!(grad.y().as_slice().iter().all(|&v| v == 0.0), "{value}");
        }
    }

    #[test]
    fn magnitude_peaks_on_edge() {
        let field = Field::from_fn(30, 5, |x, _| if x < 15 { 0.0 } else { 255.0 });
        let mag = gradient_magnitude(&field, 1.5);
        let at_edge = mag.get(14, 2).max(mag.get(15, 2));
        assert!(at_edge > mag.get(5, 2));
        assert!(at_edge > mag.get(25, 2));
    }
}
