// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement pipeline — skew correction and adaptive binarization of
// document images ahead of text recognition.
//
// Three modes share the same tail (denoise → adaptive threshold → channel
// conversion):
//
// - `Finalize`: the image is already a flat, cropped page.
// - `AutoEnhance`: measure residual skew from the text pixels and rotate it
//   away first.
// - `FullAuto`: find the page outline on the grayscale image and rectify it
//   first; falls back to `AutoEnhance` when no outline is found.

use flatscan_core::config::EnhancementConfig;
use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::geometry::Point;
use flatscan_core::types::EnhancementMode;
use image::{GrayImage, Luma};
use imageproc::point::Point as PixelPoint;
use tracing::{debug, info, instrument, warn};

use super::contour::{min_area_rect, normalize_skew_angle};
use super::detect::BoundaryDetector;
use super::rectify::PerspectiveRectifier;
use crate::image::processor::{ImageProcessor, gaussian_mean};
use crate::image::raster::RasterImage;

/// Result of one enhancement run.
#[derive(Debug, Clone)]
pub struct EnhancedImage {
    /// Binarized output in the input's channel layout.
    pub image: RasterImage,
    /// Rotation (degrees) removed by skew correction, if any was applied.
    pub rotation_applied: Option<f64>,
    /// Whether a detected page outline was rectified (`FullAuto` only).
    pub boundary_applied: bool,
}

/// Measured skew of the foreground in a grayscale image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewEstimate {
    /// Angle in (-45°, 45°], clockwise positive.
    pub angle: f64,
    /// Centre of the foreground's minimum-area rectangle.
    pub center: Point,
    /// Number of foreground pixels measured.
    pub foreground_pixels: usize,
}

/// Grayscale → (deskew | rectify) → denoise → adaptive threshold.
#[derive(Debug, Clone)]
pub struct EnhancementPipeline {
    config: EnhancementConfig,
    detector: BoundaryDetector,
    rectifier: PerspectiveRectifier,
}

impl EnhancementPipeline {
    // -- Construction ---------------------------------------------------------

    /// Build a pipeline, rejecting invalid configuration up front.
    pub fn new(config: EnhancementConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            detector: BoundaryDetector::new(),
            rectifier: PerspectiveRectifier::new(),
        })
    }

    pub fn config(&self) -> &EnhancementConfig {
        &self.config
    }

    // -- Entry points ---------------------------------------------------------

    /// Binarize an already flat, cropped page. Dimensions are preserved.
    pub fn finalize(&self, image: &RasterImage) -> Result<RasterImage> {
        Ok(self.run(image, EnhancementMode::Finalize)?.image)
    }

    /// Correct residual skew, then binarize. Dimensions are preserved.
    pub fn auto_enhance(&self, image: &RasterImage) -> Result<RasterImage> {
        Ok(self.run(image, EnhancementMode::AutoEnhance)?.image)
    }

    /// Run the pipeline in `mode`.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn run(&self, image: &RasterImage, mode: EnhancementMode) -> Result<EnhancedImage> {
        info!(?mode, "Running scan enhancement pipeline");
        let gray = image.to_gray();

        let (gray, rotation_applied, boundary_applied) = match mode {
            EnhancementMode::Finalize => (gray, None, false),
            EnhancementMode::AutoEnhance => {
                let (deskewed, rotation) = self.deskew(gray);
                (deskewed, rotation, false)
            }
            EnhancementMode::FullAuto => match self.rectify_outline(&gray) {
                Some(rectified) => (rectified, None, true),
                None => {
                    let (deskewed, rotation) = self.deskew(gray);
                    (deskewed, rotation, false)
                }
            },
        };

        let denoised = ImageProcessor::from_gray(gray).blur(self.config.blur_kernel).into_gray();
        let binary = adaptive_threshold(
            &denoised,
            self.config.block_size,
            self.config.threshold_constant,
        );
        let output = RasterImage::from_gray(binary, image.layout())?;

        debug!(
            out_w = output.width(),
            out_h = output.height(),
            rotation = ?rotation_applied,
            boundary_applied,
            "Enhancement complete"
        );
        Ok(EnhancedImage {
            image: output,
            rotation_applied,
            boundary_applied,
        })
    }

    // -- Skew correction ------------------------------------------------------

    /// Measure the foreground's skew. `None` when there is no foreground.
    pub fn estimate_skew(&self, gray: &GrayImage) -> Option<SkewEstimate> {
        let Some(threshold) = otsu_threshold(gray) else {
            debug!("Uniform image; no foreground to measure");
            return None;
        };

        // Dark text on a light page is the foreground. The hull of the
        // foreground only depends on each row's extreme pixels.
        let mut extremes = Vec::new();
        let mut foreground_pixels = 0usize;
        for (y, row) in gray.rows().enumerate() {
            let mut first = None;
            let mut last = 0i32;
            for (x, pixel) in row.enumerate() {
                if pixel.0[0] <= threshold {
                    foreground_pixels += 1;
                    first.get_or_insert(x as i32);
                    last = x as i32;
                }
            }
            if let Some(first) = first {
                extremes.push(PixelPoint::new(first, y as i32));
                extremes.push(PixelPoint::new(last, y as i32));
            }
        }

        let rect = min_area_rect(&extremes)?;
        let angle = normalize_skew_angle(rect.angle);
        debug!(angle, foreground_pixels, "Skew estimated");
        Some(SkewEstimate {
            angle,
            center: rect.center,
            foreground_pixels,
        })
    }

    /// Rotate the skew away when it exceeds the configured tolerance.
    ///
    /// Returns the corrected image and the rotation removed, if any.
    fn deskew(&self, gray: GrayImage) -> (GrayImage, Option<f64>) {
        let Some(skew) = self.estimate_skew(&gray) else {
            return (gray, None);
        };
        if skew.angle.abs() < self.config.skew_angle_tolerance {
            debug!(angle = skew.angle, "Skew within tolerance; leaving upright");
            return (gray, None);
        }

        info!(angle = skew.angle, "Correcting skew");
        let rotated = ImageProcessor::from_gray(gray)
            .rotate_about(skew.center, -skew.angle)
            .into_gray();
        (rotated, Some(skew.angle))
    }

    /// Find and rectify the page outline on the grayscale image.
    fn rectify_outline(&self, gray: &GrayImage) -> Option<GrayImage> {
        let quad = self.detector.detect_in_gray(gray)?;
        match self.rectifier.rectify_gray(gray.clone(), &quad) {
            Ok(rectified) => Some(rectified),
            Err(FlatscanError::InvalidGeometry(detail)) => {
                warn!(
                    %detail,
                    "Detected outline could not be rectified; falling back to skew correction"
                );
                None
            }
            Err(err) => {
                warn!(error = %err, "Rectification failed; falling back to skew correction");
                None
            }
        }
    }
}

// -- Thresholding -------------------------------------------------------------

/// Compute the Otsu threshold for a grayscale image.
///
/// Finds the threshold value that maximises the between-class variance of
/// the dark and light pixel groups; pixels `<= threshold` form the dark
/// class. Returns `None` for an image with a single intensity.
pub fn otsu_threshold(gray: &GrayImage) -> Option<u8> {
    // Build histogram.
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if histogram.iter().filter(|&&count| count > 0).count() < 2 {
        return None;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = -1.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    Some(best_threshold)
}

/// Binarize against a Gaussian-weighted local mean.
///
/// A pixel becomes white (255) when it is brighter than the mean of its
/// `block_size` x `block_size` neighbourhood minus `constant`, black
/// otherwise. Tolerates uneven lighting across a photographed page.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, constant: f32) -> GrayImage {
    let local_mean = gaussian_mean(gray, block_size);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0] as f32;
        let mean = local_mean.get_pixel(x, y).0[0];
        Luma([if value > mean - constant { 255 } else { 0 }])
    })
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flatscan_core::geometry::TransformMatrix;
    use image::{DynamicImage, RgbaImage};
    use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
    use imageproc::rect::Rect;

    use crate::image::raster::ChannelLayout;

    fn pipeline() -> EnhancementPipeline {
        EnhancementPipeline::new(EnhancementConfig::default()).unwrap()
    }

    fn raster(gray: GrayImage) -> RasterImage {
        RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap()
    }

    /// White page with four lines of dark "words", rotated `degrees`
    /// clockwise about the page centre. Words are spaced widely enough that
    /// none of them traces as a page outline.
    fn skewed_page(degrees: f64) -> GrayImage {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([245u8]));
        let rotation = TransformMatrix::rotation_about(Point::new(200.0, 150.0), degrees);
        for line in 0..4 {
            for word in 0..6 {
                let (x0, y0) = (80.0 + word as f64 * 40.0, 100.0 + line as f64 * 30.0);
                let corners = [(x0, y0), (x0 + 24.0, y0), (x0 + 24.0, y0 + 10.0), (x0, y0 + 10.0)];
                let outline: Vec<PixelPoint<i32>> = corners
                    .iter()
                    .filter_map(|&(x, y)| rotation.apply(Point::new(x, y)))
                    .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
                    .collect();
                draw_polygon_mut(&mut gray, &outline, Luma([20u8]));
            }
        }
        gray
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EnhancementConfig {
            block_size: 10,
            ..Default::default()
        };
        assert!(matches!(EnhancementPipeline::new(config), Err(FlatscanError::InvalidConfig(_))));
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let mut gray = GrayImage::from_pixel(100, 100, Luma([200u8]));
        draw_filled_rect_mut(&mut gray, Rect::at(10, 10).of_size(30, 30), Luma([40u8]));
        let threshold = otsu_threshold(&gray).unwrap();
        assert!((40..200).contains(&threshold));
    }

    #[test]
    fn otsu_of_uniform_image_is_none() {
        assert!(otsu_threshold(&GrayImage::from_pixel(10, 10, Luma([255u8]))).is_none());
        assert!(otsu_threshold(&GrayImage::from_pixel(10, 10, Luma([0u8]))).is_none());
    }

    #[test]
    fn adaptive_threshold_survives_uneven_lighting() {
        // Brightness ramps from 90 to 250 left to right; dark strokes are 60
        // below their surroundings everywhere.
        let mut gray = GrayImage::from_fn(300, 100, |x, _| Luma([(90 + x * 160 / 300) as u8]));
        for x in (20..280).step_by(40) {
            for y in 40..60 {
                for dx in 0..4 {
                    let bg = gray.get_pixel(x + dx, y).0[0];
                    gray.put_pixel(x + dx, y, Luma([bg - 60]));
                }
            }
        }
        let binary = adaptive_threshold(&gray, 35, 10.0);
        for x in (20..280).step_by(40) {
            assert_eq!(binary.get_pixel(x + 1, 50).0[0], 0, "stroke at x={x} lost");
            assert_eq!(binary.get_pixel(x + 20, 50).0[0], 255, "background at x={x} inked");
        }
    }

    #[test]
    fn finalize_preserves_dimensions_and_layout() {
        let rgba = RgbaImage::from_fn(640, 480, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let input = RasterImage::from_dynamic(DynamicImage::ImageRgba8(rgba)).unwrap();
        let out = pipeline().finalize(&input).unwrap();
        assert_eq!(out.dimensions(), (640, 480));
        assert_eq!(out.layout(), ChannelLayout::Rgba);
        assert!(out.as_bytes().chunks(4).all(|px| (px[0] == 0 || px[0] == 255) && px[3] == 255));
    }

    #[test]
    fn skew_is_measured_in_half_open_range() {
        let estimate = pipeline().estimate_skew(&skewed_page(10.0)).unwrap();
        assert!((estimate.angle - 10.0).abs() < 1.0, "{estimate:?}");

        let estimate = pipeline().estimate_skew(&skewed_page(-7.0)).unwrap();
        assert!((estimate.angle + 7.0).abs() < 1.0, "{estimate:?}");
    }

    #[test]
    fn auto_enhance_removes_skew() {
        let pipeline = pipeline();
        let result = pipeline
            .run(&raster(skewed_page(10.0)), EnhancementMode::AutoEnhance)
            .unwrap();
        let rotation = result.rotation_applied.expect("rotation should be applied");
        assert!((rotation - 10.0).abs() < 1.0);
        assert_eq!(result.image.dimensions(), (400, 300));

        let residual = pipeline.estimate_skew(&result.image.to_gray()).unwrap();
        assert!(residual.angle.abs() < 1.5, "{residual:?}");
    }

    #[test]
    fn small_skew_is_left_alone() {
        let config = EnhancementConfig {
            skew_angle_tolerance: 5.0,
            ..Default::default()
        };
        let pipeline = EnhancementPipeline::new(config).unwrap();
        let result = pipeline
            .run(&raster(skewed_page(3.0)), EnhancementMode::AutoEnhance)
            .unwrap();
        assert!(result.rotation_applied.is_none());
    }

    #[test]
    fn blank_input_is_not_rotated() {
        for value in [0u8, 255u8] {
            let input = raster(GrayImage::from_pixel(200, 150, Luma([value])));
            let result = pipeline().run(&input, EnhancementMode::AutoEnhance).unwrap();
            assert!(result.rotation_applied.is_none());
            assert_eq!(result.image.dimensions(), (200, 150));
        }
    }

    #[test]
    fn full_auto_rectifies_detected_page() {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([30u8]));
        draw_filled_rect_mut(&mut gray, Rect::at(60, 50).of_size(280, 200), Luma([230u8]));
        let result = pipeline().run(&raster(gray), EnhancementMode::FullAuto).unwrap();
        assert!(result.boundary_applied);
        let (w, h) = result.image.dimensions();
        assert!((270..=295).contains(&w) && (190..=215).contains(&h), "{w}x{h}");
    }

    #[test]
    fn full_auto_falls_back_to_skew_correction() {
        let result = pipeline()
            .run(&raster(skewed_page(10.0)), EnhancementMode::FullAuto)
            .unwrap();
        assert!(!result.boundary_applied);
        assert!(result.rotation_applied.is_some());
        assert_eq!(result.image.dimensions(), (400, 300));
    }
}
