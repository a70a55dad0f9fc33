// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Owned raster image — width, height, channel layout and an 8-bit pixel
// buffer. Each pipeline stage takes its input by reference and hands back a
// freshly owned output; intermediates are dropped at the end of the stage.

use std::path::Path;

use flatscan_core::error::{FlatscanError, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat};
use tracing::{debug, instrument};

/// Interleaved 8-bit channel layouts a `RasterImage` can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    /// Samples per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::GrayAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// A decoded image with non-zero dimensions.
///
/// Decoders producing 16-bit or float samples are converted to RGBA8 on
/// construction so every downstream stage sees one of four 8-bit layouts.
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
    layout: ChannelLayout,
}

impl RasterImage {
    // -- Construction ---------------------------------------------------------

    /// Wrap an already-decoded image. Fails with `EmptyImage` for zero
    /// width or height.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(FlatscanError::EmptyImage { width, height });
        }

        let (image, layout) = match image {
            DynamicImage::ImageLuma8(_) => (image, ChannelLayout::Gray),
            DynamicImage::ImageLumaA8(_) => (image, ChannelLayout::GrayAlpha),
            DynamicImage::ImageRgb8(_) => (image, ChannelLayout::Rgb),
            DynamicImage::ImageRgba8(_) => (image, ChannelLayout::Rgba),
            other => (DynamicImage::ImageRgba8(other.to_rgba8()), ChannelLayout::Rgba),
        };
        Ok(Self { image, layout })
    }

    /// Build from a raw interleaved pixel buffer, as handed over by a camera
    /// frame callback.
    pub fn from_raw(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * layout.channels();
        if pixels.len() != expected {
            return Err(FlatscanError::InvalidImage(format!(
                "buffer holds {} bytes but {width}x{height} {layout:?} needs {expected}",
                pixels.len()
            )));
        }

        let mismatch = || {
            FlatscanError::InvalidImage(format!("cannot wrap {width}x{height} {layout:?} buffer"))
        };
        let image = match layout {
            ChannelLayout::Gray => DynamicImage::ImageLuma8(
                ImageBuffer::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
            ChannelLayout::GrayAlpha => DynamicImage::ImageLumaA8(
                ImageBuffer::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
            ChannelLayout::Rgb => DynamicImage::ImageRgb8(
                ImageBuffer::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
            ChannelLayout::Rgba => DynamicImage::ImageRgba8(
                ImageBuffer::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
        };
        Self::from_dynamic(image)
    }

    /// Decode encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| FlatscanError::InvalidImage(format!("failed to decode image: {err}")))?;
        debug!(width = image.width(), height = image.height(), "Image decoded from bytes");
        Self::from_dynamic(image)
    }

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let image = image::open(path.as_ref()).map_err(|err| match err {
            image::ImageError::IoError(io) => FlatscanError::Io(io),
            other => FlatscanError::InvalidImage(format!(
                "failed to open {}: {other}",
                path.as_ref().display()
            )),
        })?;
        debug!(width = image.width(), height = image.height(), "Image loaded");
        Self::from_dynamic(image)
    }

    /// Expand a grayscale result into `layout`. Colour channels repeat the
    /// luma value and alpha is opaque.
    pub fn from_gray(gray: GrayImage, layout: ChannelLayout) -> Result<Self> {
        let gray = DynamicImage::ImageLuma8(gray);
        let image = match layout {
            ChannelLayout::Gray => gray,
            ChannelLayout::GrayAlpha => DynamicImage::ImageLumaA8(gray.to_luma_alpha8()),
            ChannelLayout::Rgb => DynamicImage::ImageRgb8(gray.to_rgb8()),
            ChannelLayout::Rgba => DynamicImage::ImageRgba8(gray.to_rgba8()),
        };
        Self::from_dynamic(image)
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Interleaved pixel bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_bytes()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Single-channel intensity copy.
    pub fn to_gray(&self) -> GrayImage {
        match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            other => other.to_luma8(),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| FlatscanError::InvalidImage(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Write the image to a file. The format is inferred from the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save(path.as_ref()).map_err(|err| match err {
            image::ImageError::IoError(io) => FlatscanError::Io(io),
            other => FlatscanError::InvalidImage(format!(
                "failed to save image to {}: {other}",
                path.as_ref().display()
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn zero_dimension_is_empty() {
        let result = RasterImage::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(0, 10)));
        assert!(matches!(
            result,
            Err(FlatscanError::EmptyImage {
                width: 0,
                height: 10
            })
        ));

        let result = RasterImage::from_raw(640, 0, ChannelLayout::Rgba, Vec::new());
        assert!(matches!(result, Err(FlatscanError::EmptyImage { .. })));
    }

    #[test]
    fn raw_buffer_length_is_checked() {
        let result = RasterImage::from_raw(4, 4, ChannelLayout::Rgb, vec![0; 47]);
        assert!(matches!(result, Err(FlatscanError::InvalidImage(_))));
        let ok = RasterImage::from_raw(4, 4, ChannelLayout::Rgb, vec![0; 48]).unwrap();
        assert_eq!(ok.layout(), ChannelLayout::Rgb);
        assert_eq!(ok.as_bytes().len(), 48);
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        let result = RasterImage::decode(b"definitely not an image");
        assert!(matches!(result, Err(FlatscanError::InvalidImage(_))));
    }

    #[test]
    fn sixteen_bit_input_is_normalised_to_rgba8() {
        let wide = DynamicImage::new_rgb16(8, 6);
        let raster = RasterImage::from_dynamic(wide).unwrap();
        assert_eq!(raster.layout(), ChannelLayout::Rgba);
        assert_eq!(raster.dimensions(), (8, 6));
    }

    #[test]
    fn gray_expands_into_requested_layout() {
        let gray = GrayImage::from_pixel(3, 2, Luma([77u8]));
        let rgba = RasterImage::from_gray(gray, ChannelLayout::Rgba).unwrap();
        assert_eq!(rgba.channels(), 4);
        assert_eq!(&rgba.as_bytes()[..4], &[77, 77, 77, 255]);
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let rgb = RgbImage::from_pixel(5, 4, Rgb([10, 200, 30]));
        let raster = RasterImage::from_dynamic(DynamicImage::ImageRgb8(rgb)).unwrap();
        let bytes = raster.to_png_bytes().unwrap();
        let back = RasterImage::decode(&bytes).unwrap();
        assert_eq!(back.dimensions(), (5, 4));
        assert_eq!(back.as_bytes(), raster.as_bytes());
    }
}
