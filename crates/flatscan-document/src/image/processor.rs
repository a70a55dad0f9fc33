// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grayscale processor — downscale, Gaussian smoothing and rotation about a
// point. Operates on in-memory images using the `image` and `imageproc`
// crates plus a bicubic warp with replicated borders.

use flatscan_core::geometry::{Point, TransformMatrix};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;
use tracing::{debug, instrument};

use super::raster::RasterImage;
use super::warp::warp_gray;

/// Single-channel processing chain.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping
/// the transformed image, enabling method chaining:
///
/// ```ignore
/// let gray = ImageProcessor::grayscale(&frame)
///     .downscale(0.5)
///     .blur(5)
///     .into_gray();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: GrayImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Start from the intensity channel of `raster`.
    pub fn grayscale(raster: &RasterImage) -> Self {
        Self { image: raster.to_gray() }
    }

    /// Wrap an existing grayscale image.
    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_gray(self) -> GrayImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Scale both axes by `factor` with area-style averaging. Never shrinks
    /// below one pixel.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn downscale(self, factor: f64) -> Self {
        let resized = downscale_gray(&self.image, factor);
        debug!(new_w = resized.width(), new_h = resized.height(), "Downscale complete");
        Self { image: resized }
    }

    /// Gaussian smoothing with a `kernel` x `kernel` window. A kernel of 1 is
    /// a no-op.
    pub fn blur(self, kernel: u32) -> Self {
        if kernel <= 1 {
            return self;
        }
        let smoothed = gaussian_mean(&self.image, kernel);
        let image = GrayImage::from_fn(smoothed.width(), smoothed.height(), |x, y| {
            Luma([smoothed.get_pixel(x, y).0[0].round().clamp(0.0, 255.0) as u8])
        });
        Self { image }
    }

    /// Rotate by `degrees` (clockwise on screen) about `center`, keeping the
    /// canvas size and replicating border pixels into uncovered areas.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate_about(self, center: Point, degrees: f64) -> Self {
        // Sampling needs destination → source, i.e. the opposite rotation.
        let inverse = TransformMatrix::rotation_about(center, -degrees);
        Self {
            image: warp_gray(&self.image, &inverse),
        }
    }
}

/// Scale both axes of `gray` by `factor` with area-style averaging.
pub fn downscale_gray(gray: &GrayImage, factor: f64) -> GrayImage {
    let width = ((gray.width() as f64 * factor).round() as u32).max(1);
    let height = ((gray.height() as f64 * factor).round() as u32).max(1);
    if (width, height) == gray.dimensions() {
        return gray.clone();
    }
    imageops::resize(gray, width, height, FilterType::Triangle)
}

// -- Gaussian filter ----------------------------------------------------------

/// Single-channel floating-point image, used for unrounded filter output.
pub type GrayF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Normalised 1-D Gaussian weights for a `size`-tap kernel.
///
/// Sigma follows the usual derivation from kernel size,
/// `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i64;
    let weights: Vec<f64> = (-half..=half)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Gaussian-weighted local mean of every pixel over a `size` x `size`
/// window, with replicated borders. Values stay unrounded.
pub fn gaussian_mean(gray: &GrayImage, size: u32) -> GrayF32Image {
    let intensity = GrayF32Image::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gray.get_pixel(x, y).0[0] as f32])
    });
    separable_filter_equal(&intensity, &gaussian_kernel(size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        for size in [1, 3, 5, 31, 35] {
            let kernel = gaussian_kernel(size);
            assert_eq!(kernel.len(), size as usize);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            for i in 0..kernel.len() / 2 {
                assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
            }
        }
    }

    #[test]
    fn filter_keeps_uniform_image_uniform() {
        let gray = GrayImage::from_pixel(30, 20, Luma([123u8]));
        for v in gaussian_mean(&gray, 35).pixels() {
            assert!((v.0[0] - 123.0).abs() < 1e-3);
        }
    }

    #[test]
    fn mean_of_horizontal_ramp_is_unrounded_and_border_clamped() {
        let gray = GrayImage::from_fn(40, 10, |x, _| Luma([(x * 5) as u8]));
        let mean = gaussian_mean(&gray, 5);
        assert_eq!(mean.dimensions(), (40, 10));
        // Symmetric weights reproduce a linear ramp away from the borders.
        assert!((mean.get_pixel(20, 5).0[0] - 100.0).abs() < 1e-3);
        // Replicated left border pulls the first column above its own value.
        assert!(mean.get_pixel(0, 5).0[0] > 0.0);
        assert!(mean.get_pixel(0, 5).0[0] < 5.0);
    }

    #[test]
    fn blur_rounds_filtered_values() {
        let mut gray = GrayImage::from_pixel(21, 21, Luma([0u8]));
        gray.put_pixel(10, 10, Luma([255]));
        let expected = gaussian_mean(&gray, 3).get_pixel(10, 10).0[0].round() as u8;
        let out = ImageProcessor::from_gray(gray).blur(3).into_gray();
        assert_eq!(out.get_pixel(10, 10).0[0], expected);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn blur_preserves_dimensions() {
        let gray = GrayImage::from_fn(64, 48, |x, y| Luma([((x ^ y) * 4) as u8]));
        let out = ImageProcessor::from_gray(gray).blur(3).into_gray();
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn downscale_halves_dimensions() {
        let raster =
            RasterImage::from_dynamic(DynamicImage::ImageRgb8(RgbImage::new(401, 300))).unwrap();
        let out = ImageProcessor::grayscale(&raster).downscale(0.5);
        assert_eq!((out.width(), out.height()), (201, 150));
    }

    #[test]
    fn rotation_keeps_canvas_and_moves_pixels_clockwise() {
        let mut gray = GrayImage::from_pixel(41, 41, Luma([255u8]));
        // Dark blob to the right of the centre.
        for y in 19..=21 {
            for x in 28..=32 {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        let out = ImageProcessor::from_gray(gray)
            .rotate_about(Point::new(20.0, 20.0), 90.0)
            .into_gray();
        assert_eq!(out.dimensions(), (41, 41));
        // A quarter turn clockwise in image coordinates moves it below the centre.
        assert!(out.get_pixel(20, 30).0[0] < 64);
        assert!(out.get_pixel(30, 20).0[0] > 192);
    }
}
