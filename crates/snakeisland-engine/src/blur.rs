//! Gaussian smoothing.
//!
//! [`gaussian_blur`] wraps [`imageproc::filter::gaussian_blur_f32`] and is
//! used to denoise decoded 8-bit rasters before an energy field is built.
//! [`smooth_field`] is the `f32` counterpart used inside the scale space,
//! where values must not be quantized back to `u8`.

use image::{GrayImage, RgbImage};

use crate::field::Field;

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Apply Gaussian blur to an RGB image by blurring each channel
/// independently.
///
/// Non-positive sigma values return the image unchanged.
#[must_use = "returns the blurred RGB image"]
pub fn gaussian_blur_rgb(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width(), image.height());

    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 3] = std::array::from_fn(|c| gaussian_blur(&channels[c], sigma));

    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

/// Kernel radius for `sigma`: `floor(3σ + 0.5)`, at least 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn kernel_radius(sigma: f32) -> usize {
    (3.0f32.mul_add(sigma, 0.5).floor() as usize).max(1)
}

/// Unnormalized Gaussian weights `exp(-d² / 2σ²)` for offsets
/// `-radius..=radius`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn gaussian_weights(sigma: f32) -> Vec<f32> {
    let radius = kernel_radius(sigma).cast_signed();
    let denom = 2.0 * sigma * sigma;
    (-radius..=radius)
        .map(|d| {
            let d = d as f32;
            (-(d * d) / denom).exp()
        })
        .collect()
}

/// Normalized 1D Gaussian smoothing kernel.
#[must_use]
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let mut weights = gaussian_weights(sigma);
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Gaussian smoothing of an `f32` field with reflective borders.
///
/// Non-positive sigma values return the field unchanged.
#[must_use = "returns the smoothed field"]
pub fn smooth_field(field: &Field, sigma: f32) -> Field {
    if sigma <= 0.0 {
        return field.clone();
    }
    let kernel = gaussian_kernel(sigma);
    field.separable(&kernel, &kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn zero_sigma_returns_unchanged() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
        assert_eq!(gaussian_blur(&img, -1.0), img);
    }

    #[test]
    fn blur_softens_edge() {
        let blurred = gaussian_blur(&sharp_edge_image(), 1.5);
        let left = blurred.get_pixel(4, 5).0[0];
        let right = blurred.get_pixel(5, 5).0[0];
        assert!(left > 0, "left of edge should pick up some brightness");
        assert!(right < 255, "right of edge should lose some brightness");
    }

    #[test]
    fn rgb_blur_preserves_dimensions() {
        let img = RgbImage::from_fn(8, 6, |x, _| image::Rgb([u8::try_from(x * 30).unwrap_or(0), 0, 9]));
        let blurred = gaussian_blur_rgb(&img, 1.0);
        assert_eq!(blurred.dimensions(), (8, 6));
        // A constant channel stays constant.
        assert!(blurred.pixels().all(|p| p.0[2] == 9));
    }

    #[test]
    fn kernel_radius_rounds() {
        assert_eq!(kernel_radius(6.0), 18);
        assert_eq!(kernel_radius(1.0), 3);
        assert_eq!(kernel_radius(0.1), 1);
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(2.0);
        assert_eq!(k.len(), 13);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-7);
        }
        assert!(k[6] > k[5]);
    }

    #[test]
    fn smoothing_keeps_constant_field() {
        let f = Field::filled(20, 10, 7.0);
        let g = smooth_field(&f, 3.0);
        assert!(g.as_slice().iter().all(|&v| (v - 7.0).abs() < 1e-4));
    }

    #[test]
    fn smoothing_spreads_an_impulse() {
        let f = Field::from_fn(21, 21, |x, y| if x == 10 && y == 10 { 1.0 } else { 0.0 });
        let g = smooth_field(&f, 2.0);
        assert!(g.get(10, 10) < 1.0);
        assert!(g.get(11, 10) > 0.0);
        assert!((g.get(9, 10) - g.get(11, 10)).abs() < 1e-7);
    }
}
