//! Perspective resampling of the second photo onto the first photo's canvas.

use super::homography::Homography;
use crate::core::backend::Warper;
use crate::core::raster::RasterImage;
use crate::error::AlignmentError;
use image::Rgba;
use nalgebra::Point2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Fill for canvas pixels that map outside the source photo.
pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Resampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

/// Inverse-mapping warper: every canvas pixel looks up where it came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveWarper {
    interpolation: Interpolation,
}

impl PerspectiveWarper {
    pub fn new(interpolation: Interpolation) -> Self {
        Self { interpolation }
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }
}

impl Warper for PerspectiveWarper {
    fn warp(
        &self,
        source: &RasterImage,
        homography: &Homography,
        width: u32,
        height: u32,
    ) -> Result<RasterImage, AlignmentError> {
        // Canvas -> source
        let inverse = homography
            .inverse()
            .ok_or(AlignmentError::SingularHomography)?;

        let mut out = RasterImage::from_pixel(width, height, BACKGROUND);
        if width == 0 || height == 0 {
            return Ok(out);
        }

        let row_len = width as usize * 4;
        let interpolation = self.interpolation;
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
                    let Some(from) = inverse.transform(Point2::new(x as f64, y as f64)) else {
                        continue;
                    };
                    let value = match interpolation {
                        Interpolation::Nearest => sample_nearest(source, from.x, from.y),
                        Interpolation::Bilinear => sample_bilinear(source, from.x, from.y),
                    };
                    pixel.copy_from_slice(&value.0);
                }
            });

        Ok(out)
    }
}

fn pixel_or_background(image: &RasterImage, x: i64, y: i64) -> Rgba<u8> {
    if x < 0 || y < 0 || x >= i64::from(image.width()) || y >= i64::from(image.height()) {
        return BACKGROUND;
    }
    *image.get_pixel(x as u32, y as u32)
}

fn sample_nearest(image: &RasterImage, x: f64, y: f64) -> Rgba<u8> {
    if !x.is_finite() || !y.is_finite() {
        return BACKGROUND;
    }
    pixel_or_background(image, x.round() as i64, y.round() as i64)
}

/// Bilinear sample; neighbours outside the image contribute the background.
fn sample_bilinear(image: &RasterImage, x: f64, y: f64) -> Rgba<u8> {
    if !x.is_finite() || !y.is_finite() {
        return BACKGROUND;
    }
    let (x0, y0) = (x.floor(), y.floor());
    if x0 < -1.0 || y0 < -1.0 || x0 >= f64::from(image.width()) || y0 >= f64::from(image.height())
    {
        return BACKGROUND;
    }

    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);
    let p00 = pixel_or_background(image, x0, y0);
    let p10 = pixel_or_background(image, x0 + 1, y0);
    let p01 = pixel_or_background(image, x0, y0 + 1);
    let p11 = pixel_or_background(image, x0 + 1, y0 + 1);

    let mut result = [0u8; 4];
    for (c, value) in result.iter_mut().enumerate() {
        let top = f64::from(p00[c]) * (1.0 - fx) + f64::from(p10[c]) * fx;
        let bottom = f64::from(p01[c]) * (1.0 - fx) + f64::from(p11[c]) * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(result)
}
