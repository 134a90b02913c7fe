//! Oriented FAST keypoints with rotated BRIEF descriptors.
//!
//! ## How It Works
//! 1. Build a scale pyramid of the grayscale photo
//! 2. Run the FAST-9 segment test on every pixel of every level
//! 3. Keep local maxima of the corner score, best first, within a per-level budget
//! 4. Orient each corner by the intensity centroid of its patch
//! 5. Sample a fixed pattern of pixel pairs, rotated to that orientation, on a
//!    smoothed copy of the level; each comparison gives one descriptor bit
//!
//! Everything is deterministic: the sampling pattern comes from a constant
//! seed and ties are broken by raster position.

use super::pyramid::{build_pyramid, PyramidLevel};
use crate::core::backend::FeatureDetector;
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// A detected corner, in level-0 pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Orientation in radians
    pub angle: f32,
    /// Pyramid level the corner was found on
    pub octave: u32,
    /// FAST corner score
    pub response: f32,
    pub descriptor: Descriptor,
}

/// ORB detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    /// Upper bound on keypoints per image, across all levels
    pub max_features: usize,
    pub pyramid_levels: u32,
    /// Size ratio between consecutive pyramid levels (> 1)
    pub scale_factor: f32,
    /// Intensity difference for a circle pixel to count as brighter/darker
    pub fast_threshold: u8,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            max_features: 500,
            pyramid_levels: 4,
            scale_factor: 1.2,
            fast_threshold: 20,
        }
    }
}

/// Bresenham circle of radius 3 used by the segment test, clockwise from the top.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous circle pixels needed for a corner (FAST-9).
const ARC_LENGTH: usize = 9;

/// Radius of the disc used for orientation.
const HALF_PATCH: i32 = 15;

/// Descriptor sample offsets lie in [-PATTERN_EXTENT, PATTERN_EXTENT]².
const PATTERN_EXTENT: i32 = 12;

const DESCRIPTOR_BITS: usize = 256;

const PATTERN_SEED: u64 = 0x0B1F_5EED;

/// Keypoints stay this far from every border so rotated samples stay inside.
const EDGE: u32 = 19;

const SMOOTHING_SIGMA: f32 = 2.0;

/// Oriented FAST + rotated BRIEF feature detector.
pub struct OrbDetector {
    config: OrbConfig,
    pattern: Vec<[[f32; 2]; 2]>,
    /// Half-width of the orientation disc for each row offset 0..=HALF_PATCH
    disc_span: Vec<i32>,
}

impl OrbDetector {
    pub fn new(config: OrbConfig) -> Self {
        let disc_span = (0..=HALF_PATCH)
            .map(|dy| f64::from(HALF_PATCH * HALF_PATCH - dy * dy).sqrt() as i32)
            .collect();

        Self {
            config,
            pattern: sampling_pattern(),
            disc_span,
        }
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    fn detect_level(&self, level: &PyramidLevel, octave: u32, budget: usize) -> Vec<Keypoint> {
        let image = &level.image;
        let (width, height) = image.dimensions();
        if budget == 0 || width <= 2 * EDGE || height <= 2 * EDGE {
            return Vec::new();
        }

        let threshold = i16::from(self.config.fast_threshold);
        let stride = width as usize;

        let mut scores = vec![0u32; stride * height as usize];
        scores
            .par_chunks_mut(stride)
            .enumerate()
            .filter(|(y, _)| *y as u32 >= EDGE && (*y as u32) < height - EDGE)
            .for_each(|(y, row)| {
                for x in EDGE..width - EDGE {
                    if let Some(score) = corner_score(image, x, y as u32, threshold) {
                        row[x as usize] = score;
                    }
                }
            });

        let mut candidates = Vec::new();
        for y in EDGE..height - EDGE {
            for x in EDGE..width - EDGE {
                let score = scores[y as usize * stride + x as usize];
                if score > 0 && is_local_max(&scores, stride, x as usize, y as usize) {
                    candidates.push((score, x, y));
                }
            }
        }

        // Strongest first, raster order among equals
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.2.cmp(&b.2)).then(a.1.cmp(&b.1)));
        candidates.truncate(budget);

        let smoothed = gaussian_blur_f32(image, SMOOTHING_SIGMA);

        candidates
            .into_iter()
            .map(|(score, x, y)| {
                let angle = self.orientation(image, x, y);
                Keypoint {
                    x: x as f32 * level.scale,
                    y: y as f32 * level.scale,
                    angle,
                    octave,
                    response: score as f32,
                    descriptor: self.describe(&smoothed, x, y, angle),
                }
            })
            .collect()
    }

    /// Angle of the vector from the corner to the patch's intensity centroid.
    fn orientation(&self, image: &GrayImage, x: u32, y: u32) -> f32 {
        let (mut m01, mut m10) = (0i64, 0i64);
        for dy in -HALF_PATCH..=HALF_PATCH {
            let span = self.disc_span[dy.unsigned_abs() as usize];
            let py = (y as i32 + dy) as u32;
            for dx in -span..=span {
                let value = i64::from(image.get_pixel((x as i32 + dx) as u32, py)[0]);
                m10 += i64::from(dx) * value;
                m01 += i64::from(dy) * value;
            }
        }
        (m01 as f32).atan2(m10 as f32)
    }

    fn describe(&self, smoothed: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let sample = |[px, py]: [f32; 2]| -> u8 {
            let rx = (cos * px - sin * py).round() as i32;
            let ry = (sin * px + cos * py).round() as i32;
            smoothed.get_pixel((x as i32 + rx) as u32, (y as i32 + ry) as u32)[0]
        };

        let mut descriptor = [0u8; 32];
        for (bit, [first, second]) in self.pattern.iter().enumerate() {
            if sample(*first) < sample(*second) {
                descriptor[bit / 8] |= 1 << (bit % 8);
            }
        }
        descriptor
    }
}

impl Default for OrbDetector {
    fn default() -> Self {
        Self::new(OrbConfig::default())
    }
}

impl FeatureDetector for OrbDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<Keypoint> {
        let pyramid = build_pyramid(
            gray,
            self.config.pyramid_levels.max(1),
            self.config.scale_factor,
            2 * EDGE + 1,
        );
        let budgets = level_budgets(self.config.max_features, &pyramid);

        pyramid
            .par_iter()
            .zip(budgets.par_iter())
            .enumerate()
            .flat_map_iter(|(octave, (level, budget))| {
                self.detect_level(level, octave as u32, *budget)
            })
            .collect()
    }
}

/// Split the feature budget across levels in proportion to level area.
fn level_budgets(total: usize, pyramid: &[PyramidLevel]) -> Vec<usize> {
    let areas: Vec<f64> = pyramid
        .iter()
        .map(|level| f64::from(level.image.width()) * f64::from(level.image.height()))
        .collect();
    let total_area: f64 = areas.iter().sum();
    if total_area <= 0.0 {
        return vec![0; pyramid.len()];
    }

    let mut budgets: Vec<usize> = areas
        .iter()
        .map(|area| (total as f64 * area / total_area).floor() as usize)
        .collect();
    let assigned: usize = budgets.iter().sum();
    if let Some(first) = budgets.first_mut() {
        *first += total.saturating_sub(assigned);
    }
    budgets
}

/// FAST-9 segment test; returns the corner score when `(x, y)` is a corner.
///
/// The score is the larger of the summed excess brightness and summed excess
/// darkness over the threshold, across the whole circle.
fn corner_score(image: &GrayImage, x: u32, y: u32, threshold: i16) -> Option<u32> {
    let center = i16::from(image.get_pixel(x, y)[0]);
    let ring: [i16; 16] = CIRCLE.map(|(dx, dy)| {
        i16::from(image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0])
    });
    let class = |value: i16| -> i8 {
        if value > center + threshold {
            1
        } else if value < center - threshold {
            -1
        } else {
            0
        }
    };

    // Any 9-pixel arc covers at least two of the four cardinal pixels
    let cardinal = [ring[0], ring[4], ring[8], ring[12]].map(class);
    let brighter = cardinal.iter().filter(|&&c| c == 1).count();
    let darker = cardinal.iter().filter(|&&c| c == -1).count();
    if brighter < 2 && darker < 2 {
        return None;
    }

    let classes = ring.map(class);
    if !has_arc(&classes, 1) && !has_arc(&classes, -1) {
        return None;
    }

    let (bright, dark) = ring.iter().fold((0u32, 0u32), |(bright, dark), &value| {
        let diff = value - center;
        if diff > threshold {
            (bright + (diff - threshold) as u32, dark)
        } else if diff < -threshold {
            (bright, dark + (-diff - threshold) as u32)
        } else {
            (bright, dark)
        }
    });

    Some(bright.max(dark))
}

fn has_arc(classes: &[i8; 16], target: i8) -> bool {
    let mut run = 0;
    for i in 0..16 + ARC_LENGTH - 1 {
        if classes[i % 16] == target {
            run += 1;
            if run >= ARC_LENGTH {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// 3x3 non-maximum suppression. Among equal neighbours the first in raster
/// order survives.
fn is_local_max(scores: &[u32], stride: usize, x: usize, y: usize) -> bool {
    let score = scores[y * stride + x];
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let ny = (y as i32 + dy) as usize;
            let nx = (x as i32 + dx) as usize;
            let neighbor = scores[ny * stride + nx];
            let earlier = dy < 0 || (dy == 0 && dx < 0);
            if (earlier && score <= neighbor) || (!earlier && score < neighbor) {
                return false;
            }
        }
    }
    true
}

fn sampling_pattern() -> Vec<[[f32; 2]; 2]> {
    let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
    let mut pattern = Vec::with_capacity(DESCRIPTOR_BITS);
    while pattern.len() < DESCRIPTOR_BITS {
        let first = [
            rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT) as f32,
            rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT) as f32,
        ];
        let second = [
            rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT) as f32,
            rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT) as f32,
        ];
        if first != second {
            pattern.push([first, second]);
        }
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    /// Dark canvas with a few bright rectangles - every rectangle corner is a FAST corner.
    fn blocks(width: u32, height: u32) -> GrayImage {
        let rects = [(40, 40, 30, 20), (100, 60, 25, 40), (60, 110, 50, 30)];
        GrayImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
            Luma([if inside { 220 } else { 30 }])
        })
    }

    #[test]
    fn flat_image_has_no_keypoints() {
        let detector = OrbDetector::default();
        assert!(detector.detect(&flat(200, 200, 128)).is_empty());
    }

    #[test]
    fn rectangle_corners_are_detected() {
        let detector = OrbDetector::default();
        let keypoints = detector.detect(&blocks(200, 200));

        assert!(!keypoints.is_empty());
        // Every level-0 rectangle corner has a keypoint within a couple of pixels
        let level0: Vec<_> = keypoints.iter().filter(|k| k.octave == 0).collect();
        for (cx, cy) in [(40.0, 40.0), (69.0, 59.0), (100.0, 60.0)] {
            assert!(
                level0
                    .iter()
                    .any(|k| (k.x - cx).abs() <= 2.0 && (k.y - cy).abs() <= 2.0),
                "no keypoint near ({}, {})",
                cx,
                cy
            );
        }
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = OrbDetector::default();
        let image = blocks(200, 200);
        assert_eq!(detector.detect(&image), detector.detect(&image));
    }

    #[test]
    fn feature_budget_is_respected() {
        let detector = OrbDetector::new(OrbConfig {
            max_features: 5,
            ..OrbConfig::default()
        });
        assert!(detector.detect(&blocks(200, 200)).len() <= 5);
    }

    #[test]
    fn keypoints_keep_clear_of_borders() {
        let detector = OrbDetector::default();
        for keypoint in detector.detect(&blocks(200, 200)) {
            assert!(keypoint.x >= EDGE as f32);
            assert!(keypoint.y >= EDGE as f32);
            assert!(keypoint.x < 200.0 - EDGE as f32);
            assert!(keypoint.y < 200.0 - EDGE as f32);
        }
    }

    #[test]
    fn segment_test_needs_contiguous_arc() {
        // Bright pixel on a dark background is a corner (all 16 darker)
        let mut image = flat(9, 9, 10);
        image.put_pixel(4, 4, Luma([200]));
        assert!(corner_score(&image, 4, 4, 20).is_some());

        // Flat neighbourhood is not
        assert!(corner_score(&flat(9, 9, 10), 4, 4, 20).is_none());
    }

    #[test]
    fn arc_wraps_around_the_circle() {
        let mut classes = [0i8; 16];
        for i in [12, 13, 14, 15, 0, 1, 2, 3, 4] {
            classes[i] = 1;
        }
        assert!(has_arc(&classes, 1));
        assert!(!has_arc(&classes, -1));

        classes[14] = 0;
        assert!(!has_arc(&classes, 1));
    }

    #[test]
    fn non_max_suppression_keeps_one_of_a_tie() {
        let stride = 5;
        let mut scores = vec![0u32; 25];
        scores[2 * stride + 2] = 7;
        scores[2 * stride + 3] = 7;
        assert!(is_local_max(&scores, stride, 2, 2));
        assert!(!is_local_max(&scores, stride, 3, 2));
    }

    #[test]
    fn budgets_sum_to_total() {
        let pyramid = build_pyramid(&blocks(200, 200), 4, 1.2, 39);
        let budgets = level_budgets(500, &pyramid);
        assert_eq!(budgets.iter().sum::<usize>(), 500);
        assert!(budgets.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn pattern_is_stable_and_in_range() {
        let first = sampling_pattern();
        assert_eq!(first, sampling_pattern());
        assert_eq!(first.len(), DESCRIPTOR_BITS);
        for [a, b] in first {
            for v in [a[0], a[1], b[0], b[1]] {
                assert!(v.abs() <= PATTERN_EXTENT as f32);
            }
        }
    }
}
