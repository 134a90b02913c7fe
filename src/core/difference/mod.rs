//! # Difference Module
//!
//! Per-pixel absolute difference between the first photo and the aligned
//! second photo, inside the selection only, collapsed to one channel.

use crate::core::geometry::PixelRect;
use crate::core::raster::{luma, GrayRaster, RasterImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How the four per-channel differences become one intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffReduction {
    /// Largest difference over R, G, B and A
    #[default]
    MaxChannel,
    /// Rec. 601 luma of the R, G, B differences
    Luma,
}

impl DiffReduction {
    fn reduce(self, a: [u8; 4], b: [u8; 4]) -> u8 {
        let d = [
            a[0].abs_diff(b[0]),
            a[1].abs_diff(b[1]),
            a[2].abs_diff(b[2]),
            a[3].abs_diff(b[3]),
        ];
        match self {
            DiffReduction::MaxChannel => d[0].max(d[1]).max(d[2]).max(d[3]),
            DiffReduction::Luma => luma(d[0], d[1], d[2]),
        }
    }
}

impl std::fmt::Display for DiffReduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffReduction::MaxChannel => write!(f, "max-channel"),
            DiffReduction::Luma => write!(f, "luma"),
        }
    }
}

/// Difference intensities for one region. Pixel `(0, 0)` of `intensity`
/// is pixel `(region.x, region.y)` of the photos.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffMap {
    pub region: PixelRect,
    pub intensity: GrayRaster,
}

impl DiffMap {
    /// Largest intensity in the map.
    pub fn peak(&self) -> u8 {
        self.intensity.pixels().map(|p| p[0]).max().unwrap_or(0)
    }
}

/// Compare `reference` and `warped` inside `region`.
///
/// Both images must share dimensions and `region` must lie inside them;
/// the pipeline guarantees both.
pub fn difference_map(
    reference: &RasterImage,
    warped: &RasterImage,
    region: PixelRect,
    reduction: DiffReduction,
) -> DiffMap {
    let mut intensity = GrayRaster::new(region.width, region.height);
    let row_len = region.width as usize;

    intensity
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(row, out)| {
            let y = region.y + row as u32;
            for (col, value) in out.iter_mut().enumerate() {
                let x = region.x + col as u32;
                *value = reduction.reduce(reference.get_pixel(x, y).0, warped.get_pixel(x, y).0);
            }
        });

    DiffMap { region, intensity }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn full(image: &RasterImage) -> PixelRect {
        PixelRect {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        }
    }

    #[test]
    fn identical_images_have_zero_difference() {
        let image = RasterImage::from_fn(20, 10, |x, y| Rgba([x as u8, y as u8, 7, 255]));
        let map = difference_map(&image, &image, full(&image), DiffReduction::default());
        assert_eq!(map.peak(), 0);
        assert_eq!(map.intensity.dimensions(), (20, 10));
    }

    #[test]
    fn reductions_differ_on_blue_versus_red() {
        let blue = RasterImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let red = RasterImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));

        let max = difference_map(&blue, &red, full(&blue), DiffReduction::MaxChannel);
        let luma = difference_map(&blue, &red, full(&blue), DiffReduction::Luma);

        assert_eq!(max.peak(), 255);
        // 0.299 * 255 + 0.114 * 255
        assert_eq!(luma.peak(), 105);
    }

    #[test]
    fn transparent_background_counts_as_difference() {
        let opaque = RasterImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let transparent = RasterImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let map = difference_map(&opaque, &transparent, full(&opaque), DiffReduction::MaxChannel);
        assert_eq!(map.peak(), 255);
    }

    #[test]
    fn map_covers_only_the_region() {
        let a = RasterImage::from_pixel(30, 30, Rgba([0, 0, 0, 255]));
        let mut b = a.clone();
        b.put_pixel(12, 15, Rgba([90, 0, 0, 255]));
        b.put_pixel(1, 1, Rgba([200, 0, 0, 255]));

        let region = PixelRect {
            x: 10,
            y: 10,
            width: 8,
            height: 6,
        };
        let map = difference_map(&a, &b, region, DiffReduction::MaxChannel);

        assert_eq!(map.intensity.dimensions(), (8, 6));
        assert_eq!(map.intensity.get_pixel(2, 5)[0], 90);
        assert_eq!(map.peak(), 90);
    }
}
