// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inverse-mapping warp with bicubic resampling and border replication, used
// to rotate grayscale working images.
//
// Every output pixel is mapped back into the source through the inverse
// transform and sampled from a 4x4 neighbourhood. Coordinates outside the
// source are clamped to the nearest edge pixel, so rotations never introduce
// a fill colour along the borders.

use flatscan_core::geometry::{Point, TransformMatrix};
use image::{GrayImage, Luma};

/// Catmull-Rom cubic convolution parameter.
const CUBIC_A: f64 = -0.5;

fn cubic_weight(t: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        ((CUBIC_A + 2.0) * t - (CUBIC_A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((CUBIC_A * t - 5.0 * CUBIC_A) * t + 8.0 * CUBIC_A) * t - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

/// Sample `gray` at `(x, y)`, replicating edge pixels.
fn sample_bicubic(gray: &GrayImage, x: f64, y: f64) -> u8 {
    let (max_x, max_y) = (gray.width() as i64 - 1, gray.height() as i64 - 1);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let wx: [f64; 4] = std::array::from_fn(|i| cubic_weight(fx - (i as f64 - 1.0)));
    let wy: [f64; 4] = std::array::from_fn(|j| cubic_weight(fy - (j as f64 - 1.0)));

    let mut acc = 0.0;
    for (j, weight_y) in wy.iter().enumerate() {
        let sy = (y0 + j as i64 - 1).clamp(0, max_y) as u32;
        for (i, weight_x) in wx.iter().enumerate() {
            let sx = (x0 + i as i64 - 1).clamp(0, max_x) as u32;
            acc += weight_x * weight_y * gray.get_pixel(sx, sy).0[0] as f64;
        }
    }
    acc.round().clamp(0.0, 255.0) as u8
}

/// Warp a grayscale image through `inverse` (destination → source), keeping
/// its dimensions.
pub fn warp_gray(gray: &GrayImage, inverse: &TransformMatrix) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        // A destination point mapped to infinity has no source; leave it black.
        let value = inverse
            .apply(Point::new(x as f64, y as f64))
            .map_or(0, |p| sample_bicubic(gray, p.x, p.y));
        Luma([value])
    })
}
