//! # Regions Module
//!
//! Outer contours of the cleaned mask become bounding rectangles in the
//! first photo's coordinates. Rectangles no bigger than the noise floor
//! in either dimension are dropped.

use crate::core::backend::ContourExtractor;
use crate::core::geometry::{DiffRect, PixelRect};
use crate::core::raster::GrayRaster;
use image::imageops;
use imageproc::contours::{find_contours, BorderType};

/// Boundary pixels of one connected foreground region, in mask coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<(u32, u32)>,
}

impl Contour {
    pub fn new(points: Vec<(u32, u32)>) -> Self {
        Self { points }
    }

    /// Smallest axis-aligned rectangle holding every boundary pixel.
    pub fn bounding_box(&self) -> Option<DiffRect> {
        let (first_x, first_y) = *self.points.first()?;
        let (min_x, min_y, max_x, max_y) = self.points.iter().fold(
            (first_x, first_y, first_x, first_y),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        );
        Some(DiffRect::new(
            min_x,
            min_y,
            max_x - min_x + 1,
            max_y - min_y + 1,
        ))
    }
}

/// Border following from imageproc, outer borders of top-level regions only.
///
/// imageproc only starts an outer border where the pixel to the left is
/// background inside the image, so the mask is traced on a canvas with a
/// one-pixel empty frame and the points are shifted back afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocContours;

impl ContourExtractor for ImageprocContours {
    fn external_contours(&self, mask: &GrayRaster) -> Vec<Contour> {
        let mut framed = GrayRaster::new(mask.width() + 2, mask.height() + 2);
        imageops::replace(&mut framed, mask, 1, 1);

        find_contours::<u32>(&framed)
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
            .map(|contour| {
                Contour::new(
                    contour
                        .points
                        .into_iter()
                        .map(|p| (p.x.saturating_sub(1), p.y.saturating_sub(1)))
                        .collect(),
                )
            })
            .collect()
    }
}

/// Bounding boxes of `contours`, translated from mask coordinates by
/// `origin`, keeping only boxes strictly larger than `min_size` in both
/// dimensions.
pub fn boxes_from_contours(
    contours: &[Contour],
    origin: PixelRect,
    min_size: u32,
) -> Vec<DiffRect> {
    contours
        .iter()
        .filter_map(Contour::bounding_box)
        .filter(|rect| rect.exceeds(min_size))
        .map(|rect| DiffRect::new(rect.x + origin.x, rect.y + origin.y, rect.width, rect.height))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn fill(mask: &mut GrayRaster, x: u32, y: u32, width: u32, height: u32) {
        for yy in y..y + height {
            for xx in x..x + width {
                mask.put_pixel(xx, yy, Luma([255]));
            }
        }
    }

    fn extract_regions(mask: &GrayRaster, origin: PixelRect, min_size: u32) -> Vec<DiffRect> {
        boxes_from_contours(&ImageprocContours.external_contours(mask), origin, min_size)
    }

    fn origin(width: u32, height: u32) -> PixelRect {
        PixelRect {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let contour = Contour::new(vec![(3, 4), (7, 4), (7, 9), (3, 9)]);
        assert_eq!(contour.bounding_box(), Some(DiffRect::new(3, 4, 5, 6)));
        assert_eq!(Contour::new(Vec::new()).bounding_box(), None);
    }

    #[test]
    fn one_box_per_blob() {
        let mut mask = GrayRaster::new(100, 80);
        fill(&mut mask, 10, 10, 20, 15);
        fill(&mut mask, 50, 40, 30, 30);

        let mut rects = extract_regions(&mask, origin(100, 80), 10);
        rects.sort_by_key(|r| (r.x, r.y));
        assert_eq!(
            rects,
            vec![DiffRect::new(10, 10, 20, 15), DiffRect::new(50, 40, 30, 30)]
        );
    }

    #[test]
    fn small_boxes_are_noise() {
        let mut mask = GrayRaster::new(60, 60);
        // 10 px wide is not strictly greater than 10
        fill(&mut mask, 5, 5, 10, 30);
        fill(&mut mask, 30, 5, 11, 11);

        let rects = extract_regions(&mask, origin(60, 60), 10);
        assert_eq!(rects, vec![DiffRect::new(30, 5, 11, 11)]);
    }

    #[test]
    fn nested_regions_report_only_the_outer_box() {
        let mut mask = GrayRaster::new(80, 80);
        fill(&mut mask, 10, 10, 60, 60);
        // Hollow it out, then put an island inside the hole
        for y in 20..60 {
            for x in 20..60 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        fill(&mut mask, 30, 30, 20, 20);

        let rects = extract_regions(&mask, origin(80, 80), 10);
        assert_eq!(rects, vec![DiffRect::new(10, 10, 60, 60)]);
    }

    #[test]
    fn boxes_are_translated_by_the_selection_origin() {
        let mut mask = GrayRaster::new(40, 40);
        fill(&mut mask, 0, 0, 15, 12);

        let selection = PixelRect {
            x: 100,
            y: 50,
            width: 40,
            height: 40,
        };
        let rects = extract_regions(&mask, selection, 10);
        assert_eq!(rects, vec![DiffRect::new(100, 50, 15, 12)]);
    }

    #[test]
    fn blobs_on_the_mask_border_are_traced() {
        let mut mask = GrayRaster::new(60, 50);
        fill(&mut mask, 0, 10, 30, 30);
        fill(&mut mask, 40, 0, 20, 50);

        let mut rects = extract_regions(&mask, origin(60, 50), 10);
        rects.sort_by_key(|r| (r.x, r.y));
        assert_eq!(
            rects,
            vec![DiffRect::new(0, 10, 30, 30), DiffRect::new(40, 0, 20, 50)]
        );
    }

    #[test]
    fn full_mask_is_one_region() {
        let mut mask = GrayRaster::new(25, 20);
        fill(&mut mask, 0, 0, 25, 20);

        let contours = ImageprocContours.external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box(), Some(DiffRect::new(0, 0, 25, 20)));
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let mask = GrayRaster::new(30, 30);
        assert!(extract_regions(&mask, origin(30, 30), 10).is_empty());
    }
}
