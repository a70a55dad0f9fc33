// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification — warp a page quadrilateral into an upright
// rectangle.
//
// The output size is the longer of each pair of opposing quad edges, so a
// foreshortened page is never under-sampled. The transform is solved in
// closed form from the four corner correspondences and applied through an
// `imageproc` projection with bicubic resampling. Output pixels whose source
// neighbourhood leaves the frame are filled white, like blank paper.

use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::geometry::{NormalizedQuad, PixelQuad, Point, TransformMatrix};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use imageproc::definitions::{Clamp, Image};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

use crate::image::raster::{ChannelLayout, RasterImage};

/// Warps a source image into a flat rectangle given four ordered corners.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveRectifier;

impl PerspectiveRectifier {
    pub fn new() -> Self {
        Self
    }

    /// Output dimensions for `corners`: `(round(W), round(H))` where W and H
    /// are the longer opposing edge lengths.
    pub fn output_size(corners: &PixelQuad) -> (u32, u32) {
        (
            corners.max_width().round() as u32,
            corners.max_height().round() as u32,
        )
    }

    /// Solve the source → destination transform for `corners`.
    pub fn transform_for(corners: &PixelQuad) -> Result<TransformMatrix> {
        corners.validate_for_rectification()?;
        let (w, h) = (corners.max_width(), corners.max_height());
        let destination = [
            Point::new(0.0, 0.0),
            Point::new(w - 1.0, 0.0),
            Point::new(w - 1.0, h - 1.0),
            Point::new(0.0, h - 1.0),
        ];
        TransformMatrix::perspective(&corners.corners(), &destination).ok_or_else(|| {
            FlatscanError::InvalidGeometry(format!(
                "no perspective transform maps {:?} onto a {w:.1}x{h:.1} rectangle",
                corners.corners()
            ))
        })
    }

    /// Rectify `image` using corners in its pixel space.
    ///
    /// Fails with `InvalidGeometry` when the corners are non-finite, not in
    /// canonical order, or enclose (almost) no area.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn rectify(&self, image: &RasterImage, corners: &PixelQuad) -> Result<RasterImage> {
        let forward = Self::transform_for(corners)?;
        let (out_w, out_h) = Self::output_size(corners);
        if out_w == 0 || out_h == 0 {
            return Err(FlatscanError::InvalidGeometry(format!(
                "quadrilateral collapses to a {out_w}x{out_h} output"
            )));
        }

        let projection = Projection::from_matrix(forward.to_row_major_f32()).ok_or_else(|| {
            FlatscanError::InvalidGeometry("perspective transform is not invertible".into())
        })?;
        debug!(?forward, "Perspective transform solved");

        let warped = match image.as_dynamic() {
            DynamicImage::ImageLuma8(src) => {
                DynamicImage::ImageLuma8(warp_page(src, &projection, Luma([255]), out_w, out_h))
            }
            DynamicImage::ImageLumaA8(src) => DynamicImage::ImageLumaA8(warp_page(
                src,
                &projection,
                LumaA([255, 255]),
                out_w,
                out_h,
            )),
            DynamicImage::ImageRgb8(src) => DynamicImage::ImageRgb8(warp_page(
                src,
                &projection,
                Rgb([255, 255, 255]),
                out_w,
                out_h,
            )),
            other => DynamicImage::ImageRgba8(warp_page(
                &other.to_rgba8(),
                &projection,
                Rgba([255, 255, 255, 255]),
                out_w,
                out_h,
            )),
        };
        let output = RasterImage::from_dynamic(warped)?;
        info!(out_w, out_h, "Perspective rectification applied");
        Ok(output)
    }

    /// Rectify using corners normalized to `image`'s dimensions.
    pub fn rectify_normalized(
        &self,
        image: &RasterImage,
        corners: &NormalizedQuad,
    ) -> Result<RasterImage> {
        let pixels = corners.to_pixels(image.width(), image.height());
        self.rectify(image, &pixels)
    }

    /// Rectify a grayscale working image.
    pub fn rectify_gray(&self, gray: GrayImage, corners: &PixelQuad) -> Result<GrayImage> {
        let raster = RasterImage::from_gray(gray, ChannelLayout::Gray)?;
        Ok(self.rectify(&raster, corners)?.to_gray())
    }
}

/// Bicubic warp of `src` into a fresh `width` x `height` canvas.
fn warp_page<P>(
    src: &Image<P>,
    projection: &Projection,
    fill: P,
    width: u32,
    height: u32,
) -> Image<P>
where
    P: Pixel + Send + Sync,
    P::Subpixel: Into<f32> + Clamp<f32> + Send + Sync,
{
    let mut out = ImageBuffer::from_pixel(width, height, fill);
    warp_into(src, projection, Interpolation::Bicubic, fill, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatscan_core::geometry::NormalizedPoint;
    use image::{DynamicImage, Luma, Rgb, RgbImage};

    fn ramp(width: u32, height: u32) -> RasterImage {
        let gray = GrayImage::from_fn(width, height, |x, _| Luma([x as u8]));
        RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap()
    }

    #[test]
    fn output_dimensions_follow_longest_edges() {
        let image = ramp(200, 100);
        let corners = PixelQuad::from_rect(0.0, 0.0, 100.0, 50.0);
        let out = PerspectiveRectifier::new().rectify(&image, &corners).unwrap();
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn skewed_quad_uses_longer_opposing_edges() {
        let image = ramp(300, 300);
        let corners = PixelQuad::from_ordered([
            Point::new(20.0, 10.0),
            Point::new(180.0, 30.0),
            Point::new(200.0, 250.0),
            Point::new(10.0, 220.0),
        ]);
        let expected = PerspectiveRectifier::output_size(&corners);
        let out = PerspectiveRectifier::new().rectify(&image, &corners).unwrap();
        assert_eq!(out.dimensions(), expected);
        assert_eq!(expected.0, corners.max_width().round() as u32);
        assert_eq!(expected.1, corners.max_height().round() as u32);
    }

    #[test]
    fn axis_aligned_rectangle_is_a_crop() {
        let image = ramp(200, 120);
        let corners = PixelQuad::from_rect(20.0, 10.0, 120.0, 70.0);
        let out = PerspectiveRectifier::new().rectify(&image, &corners).unwrap();
        assert_eq!(out.dimensions(), (100, 60));

        let gray = out.to_gray();
        for y in 2..58 {
            for x in 2..98 {
                // Destination spans W-1 pixels over the W-pixel source edge.
                let expected = 20.0 + x as f64 * 100.0 / 99.0;
                let got = gray.get_pixel(x, y).0[0] as f64;
                assert!((got - expected).abs() <= 1.5, "({x},{y}) got {got} expected {expected}");
            }
        }
    }

    #[test]
    fn layout_is_preserved() {
        let rgb = RgbImage::from_pixel(80, 60, Rgb([200, 10, 10]));
        let image = RasterImage::from_dynamic(DynamicImage::ImageRgb8(rgb)).unwrap();
        let corners = PixelQuad::from_rect(10.0, 10.0, 70.0, 50.0);
        let out = PerspectiveRectifier::new().rectify(&image, &corners).unwrap();
        assert_eq!(out.layout(), ChannelLayout::Rgb);
        assert_eq!(&out.as_bytes()[..3], &[200, 10, 10]);
    }

    #[test]
    fn degenerate_corners_are_invalid_geometry() {
        let image = ramp(100, 100);
        let collapsed = PixelQuad::from_rect(50.0, 10.0, 50.0, 90.0);
        let err = PerspectiveRectifier::new().rectify(&image, &collapsed).unwrap_err();
        assert!(matches!(err, FlatscanError::InvalidGeometry(_)));
    }

    #[test]
    fn unordered_corners_are_invalid_geometry() {
        let image = ramp(100, 100);
        let q = PixelQuad::from_rect(10.0, 10.0, 90.0, 90.0);
        let crossed =
            PixelQuad::from_ordered([q.top_left, q.bottom_right, q.top_right, q.bottom_left]);
        assert!(matches!(
            PerspectiveRectifier::new().rectify(&image, &crossed),
            Err(FlatscanError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn corners_on_the_frame_edge_fill_with_white() {
        let gray = GrayImage::from_pixel(60, 40, Luma([50u8]));
        let image = RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap();
        let corners = PixelQuad::from_rect(0.0, 0.0, 59.0, 39.0);
        let out = PerspectiveRectifier::new().rectify(&image, &corners).unwrap().to_gray();
        assert_eq!(out.get_pixel(0, 20).0[0], 255);
        assert_eq!(out.get_pixel(30, 20).0[0], 50);
    }

    #[test]
    fn perspective_quad_straightens_converging_edges() {
        // Dark band between x = 100 and 140 of a 300 px wide frame.
        let gray = GrayImage::from_fn(300, 200, |x, _| {
            Luma([if (100..140).contains(&x) { 0 } else { 220 }])
        });
        let image = RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap();
        // Top edge narrower than the bottom, as seen from below the page.
        let corners = PixelQuad::from_ordered([
            Point::new(60.0, 20.0),
            Point::new(240.0, 20.0),
            Point::new(280.0, 180.0),
            Point::new(20.0, 180.0),
        ]);
        let out = PerspectiveRectifier::new().rectify(&image, &corners).unwrap().to_gray();
        assert_eq!(out.dimensions(), (260, 165));
        // Both edges now span the full output width, so the band sits further
        // left along the narrow top edge than along the wide bottom edge.
        let dark_centre = |y: u32| {
            let xs: Vec<u32> =
                (0..out.width()).filter(|&x| out.get_pixel(x, y).0[0] < 110).collect();
            xs.iter().sum::<u32>() as f64 / xs.len().max(1) as f64
        };
        let (top, bottom) = (dark_centre(5), dark_centre(159));
        assert!(bottom > top + 8.0, "top {top} bottom {bottom}");
    }

    #[test]
    fn normalized_corners_scale_with_the_image() {
        let image = ramp(200, 100);
        let corners = NormalizedQuad::from_ordered([
            NormalizedPoint::new(0.0, 0.0),
            NormalizedPoint::new(0.5, 0.0),
            NormalizedPoint::new(0.5, 0.5),
            NormalizedPoint::new(0.0, 0.5),
        ]);
        let out = PerspectiveRectifier::new().rectify_normalized(&image, &corners).unwrap();
        assert_eq!(out.dimensions(), (100, 50));
    }
}
