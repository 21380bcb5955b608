//! Raster input for energy fields.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP, TIFF) or already-decoded
//! `image` buffers and stores them as one or more `f32` channels of equal
//! shape.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::blur::{gaussian_blur, gaussian_blur_rgb};
use crate::field::Field;
use crate::types::{Dimensions, SnakeError};

/// A scalar or multi-channel raster sampled as `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    channels: Vec<Field>,
}

impl SourceImage {
    /// Wrap equally-shaped channels.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::EmptyInput`] if `channels` is empty and
    /// [`SnakeError::ChannelMismatch`] if their shapes differ.
    pub fn from_channels(channels: Vec<Field>) -> Result<Self, SnakeError> {
        let Some(first) = channels.first() else {
            return Err(SnakeError::EmptyInput);
        };
        let dims = first.dimensions();
        if channels.iter().any(|c| c.dimensions() != dims) {
            return Err(SnakeError::ChannelMismatch);
        }
        Ok(Self { channels })
    }

    /// A single-channel raster.
    #[must_use]
    pub fn from_field(field: Field) -> Self {
        Self {
            channels: vec![field],
        }
    }

    /// A single-channel raster from an 8-bit grayscale image.
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        Self::from_field(Field::from_fn(image.width(), image.height(), |x, y| {
            f32::from(image.get_pixel(x, y).0[0])
        }))
    }

    /// A three-channel raster from an 8-bit RGB image.
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let channels = (0..3)
            .map(|c| {
                Field::from_fn(image.width(), image.height(), |x, y| {
                    f32::from(image.get_pixel(x, y).0[c])
                })
            })
            .collect();
        Self { channels }
    }

    /// Color images keep their RGB channels (alpha is dropped); everything
    /// else becomes a single luminance channel.
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        if image.color().has_color() {
            Self::from_rgb(&image.to_rgb8())
        } else {
            Self::from_gray(&image.to_luma8())
        }
    }

    /// Width and height shared by all channels.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.first_channel().dimensions()
    }

    /// Number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// All channels, in order.
    #[must_use]
    pub fn channels(&self) -> &[Field] {
        &self.channels
    }

    /// The first channel.
    #[must_use]
    pub fn first_channel(&self) -> &Field {
        // `channels` is non-empty by construction.
        &self.channels[0]
    }

    /// Scalar view: the per-pixel mean of all channels.
    #[must_use]
    pub fn scalar(&self) -> Field {
        let (first, rest) = (self.first_channel(), &self.channels[1..]);
        if rest.is_empty() {
            return first.clone();
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.channels.len() as f32;
        rest.iter()
            .fold(first.clone(), |acc, c| acc.zip_map(c, |a, b| a + b))
            .map(|v| v / n)
    }
}

/// Decode raw image bytes, optionally pre-blurring each 8-bit channel.
///
/// Non-positive `pre_blur_sigma` disables the blur.
///
/// # Errors
///
/// Returns [`SnakeError::EmptyInput`] if `bytes` is empty.
/// Returns [`SnakeError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8], pre_blur_sigma: f32) -> Result<SourceImage, SnakeError> {
    if bytes.is_empty() {
        return Err(SnakeError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    let source = if img.color().has_color() {
        SourceImage::from_rgb(&gaussian_blur_rgb(&img.to_rgb8(), pre_blur_sigma))
    } else {
        SourceImage::from_gray(&gaussian_blur(&img.to_luma8(), pre_blur_sigma))
    };
    let dims = source.dimensions();
    log::debug!(
        "decoded {}x{} image with {} channel(s)",
        dims.width,
        dims.height,
        source.channel_count()
    );
    Ok(source)
}
