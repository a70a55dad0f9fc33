// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Boundary detection — find the four-corner outline of a page in a camera
// frame.
//
// ## Pipeline
//
// 1. Convert to grayscale and downscale by `ANALYSIS_SCALE`
// 2. Gaussian blur (5x5) to suppress sensor noise
// 3. Canny edge detection, then a one-pixel dilation to close small gaps
// 4. Trace closed contours and rank them by enclosed area, largest first
// 5. Approximate each as a polygon (epsilon = 2% of perimeter); accept the
//    first with exactly four vertices
// 6. Rescale to the frame's pixel space and canonically order the corners
//
// Stateless and best-effort: no candidate is not an error, just `None`.

use flatscan_core::constants::{
    ANALYSIS_SCALE, APPROX_EPSILON_RATIO, CANNY_HIGH_THRESHOLD, CANNY_LOW_THRESHOLD,
    DETECTION_BLUR_KERNEL, EDGE_CLOSING_RADIUS, MIN_CONTOUR_AREA,
};
use flatscan_core::geometry::{NormalizedQuad, PixelQuad, Point};
use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::geometry::contour_area;
use imageproc::morphology::dilate;
use imageproc::point::Point as PixelPoint;
use tracing::{debug, instrument};

use super::contour::Contour;
use crate::image::processor::{ImageProcessor, downscale_gray};
use crate::image::raster::RasterImage;

/// Smallest analysis image (per side) worth running edge detection on.
const MIN_ANALYSIS_SIDE: u32 = 8;

/// Finds the document quadrilateral in a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryDetector;

impl BoundaryDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect the page outline, normalized to the frame's dimensions.
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    pub fn detect(&self, frame: &RasterImage) -> Option<NormalizedQuad> {
        let gray = frame.to_gray();
        let quad = self.detect_in_gray(&gray)?;
        Some(quad.normalize(frame.width(), frame.height()))
    }

    /// Detect the page outline in pixel coordinates of `gray`.
    pub fn detect_in_gray(&self, gray: &GrayImage) -> Option<PixelQuad> {
        let (width, height) = gray.dimensions();
        let small = downscale_gray(gray, ANALYSIS_SCALE);
        if small.width() < MIN_ANALYSIS_SIDE || small.height() < MIN_ANALYSIS_SIDE {
            debug!(width, height, "Frame too small for boundary analysis");
            return None;
        }

        let (scale_x, scale_y) = (
            width as f64 / small.width() as f64,
            height as f64 / small.height() as f64,
        );

        let blurred = ImageProcessor::from_gray(small).blur(DETECTION_BLUR_KERNEL).into_gray();
        let edges = canny(&blurred, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
        let closed = dilate(&edges, Norm::LInf, EDGE_CLOSING_RADIUS);

        let mut contours: Vec<Contour> = find_contours::<i32>(&closed)
            .into_iter()
            .map(|traced| Contour::new(traced.points))
            .collect();
        contours.sort_by(|a, b| b.area.total_cmp(&a.area));
        debug!(contour_count = contours.len(), "Contours traced");

        for contour in &contours {
            // Sorted descending: everything after this is noise too.
            if contour.area < MIN_CONTOUR_AREA {
                break;
            }

            let polygon = contour.approximate(APPROX_EPSILON_RATIO * contour.perimeter());
            if polygon.len() != 4 || contour_area(&polygon) < MIN_CONTOUR_AREA {
                continue;
            }
            let vertices = [polygon[0], polygon[1], polygon[2], polygon[3]];

            // Map pixel centres from the analysis image back to the frame.
            let to_frame = |p: PixelPoint<i32>| {
                Point::new(
                    ((p.x as f64 + 0.5) * scale_x - 0.5).clamp(0.0, (width - 1) as f64),
                    ((p.y as f64 + 0.5) * scale_y - 0.5).clamp(0.0, (height - 1) as f64),
                )
            };
            let quad = PixelQuad::from_unordered(vertices.map(to_frame));
            debug!(
                area = contour.area,
                top_left = ?quad.top_left,
                bottom_right = ?quad.bottom_right,
                "Boundary quadrilateral found"
            );
            return Some(quad);
        }

        debug!("No quadrilateral boundary found");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Luma};
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
    use imageproc::rect::Rect;

    fn frame(gray: GrayImage) -> RasterImage {
        RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap()
    }

    fn assert_near(actual: &NormalizedQuad, expected: [(f64, f64); 4], tolerance: f64) {
        for (corner, (ex, ey)) in actual.corners().iter().zip(expected) {
            assert!(
                (corner.x - ex).abs() < tolerance && (corner.y - ey).abs() < tolerance,
                "corner {corner:?} not within {tolerance} of ({ex}, {ey}); quad = {actual:?}"
            );
        }
    }

    #[test]
    fn finds_axis_aligned_page() {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([30u8]));
        draw_filled_rect_mut(&mut gray, Rect::at(60, 50).of_size(280, 200), Luma([230u8]));

        let quad = BoundaryDetector::new().detect(&frame(gray)).expect("page should be found");
        assert!(quad.is_canonical());
        assert_near(
            &quad,
            [
                (0.15, 50.0 / 300.0),
                (0.85, 50.0 / 300.0),
                (0.85, 250.0 / 300.0),
                (0.15, 250.0 / 300.0),
            ],
            0.03,
        );
    }

    #[test]
    fn finds_page_under_perspective() {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([25u8]));
        let outline = [
            PixelPoint::new(80, 40),
            PixelPoint::new(330, 70),
            PixelPoint::new(300, 260),
            PixelPoint::new(60, 230),
        ];
        draw_polygon_mut(&mut gray, &outline, Luma([235u8]));

        let quad = BoundaryDetector::new().detect(&frame(gray)).expect("page should be found");
        assert_near(
            &quad,
            [
                (80.0 / 400.0, 40.0 / 300.0),
                (330.0 / 400.0, 70.0 / 300.0),
                (300.0 / 400.0, 260.0 / 300.0),
                (60.0 / 400.0, 230.0 / 300.0),
            ],
            0.04,
        );
    }

    #[test]
    fn blank_frame_has_no_boundary() {
        let gray = GrayImage::from_pixel(320, 240, Luma([128u8]));
        assert!(BoundaryDetector::new().detect(&frame(gray)).is_none());
    }

    #[test]
    fn round_shape_has_no_boundary() {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([30u8]));
        draw_filled_circle_mut(&mut gray, (200, 150), 110, Luma([230u8]));
        assert!(BoundaryDetector::new().detect(&frame(gray)).is_none());
    }

    #[test]
    fn noise_sized_rectangle_is_ignored() {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([30u8]));
        draw_filled_rect_mut(&mut gray, Rect::at(100, 100).of_size(30, 30), Luma([230u8]));
        assert!(BoundaryDetector::new().detect(&frame(gray)).is_none());
    }

    #[test]
    fn tiny_frame_has_no_boundary() {
        let gray = GrayImage::from_pixel(6, 6, Luma([0u8]));
        assert!(BoundaryDetector::new().detect(&frame(gray)).is_none());
    }
}
