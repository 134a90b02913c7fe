//! Projective transforms and robust estimation from noisy correspondences.
//!
//! ## Algorithm
//! - **DLT**: each correspondence gives two rows of `A h = 0`; `h` is the right
//!   singular vector of the smallest singular value. Points are Hartley
//!   normalised first (centroid at origin, mean distance sqrt(2)).
//! - **RANSAC**: fit minimal 4-point samples, count correspondences that
//!   reproject within the tolerance, keep the best model, then refit on all
//!   of its inliers.

use crate::core::backend::HomographySolver;
use crate::error::AlignmentError;
use nalgebra::{DMatrix, Matrix3, Point2, Vector3, SVD};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default RANSAC seed. Any constant works, it only has to be fixed.
pub const DEFAULT_RANSAC_SEED: u64 = 0x5EED_D1FF;

/// Minimum correspondences for a homography.
const SAMPLE_SIZE: usize = 4;

/// Twice the triangle area below which three points count as collinear.
const COLLINEAR_EPSILON: f64 = 1.0;

/// Sample points closer than this (pixels) count as the same feature.
/// Pyramid levels report one corner a pixel or two apart.
const MIN_POINT_SEPARATION: f64 = 4.0;

/// Largest area change of the image frame a hand-held retake can produce.
const MAX_FRAME_AREA_CHANGE: f64 = 4.0;

const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];

const W_EPSILON: f64 = 1e-12;

/// A 3x3 projective transform, normalised so the bottom-right entry is 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Wrap a raw matrix, rescaling so `m[(2, 2)] == 1`.
    ///
    /// Returns `None` if the matrix cannot be rescaled or is not finite.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Option<Self> {
        let scale = matrix[(2, 2)];
        if scale.abs() < W_EPSILON {
            return None;
        }
        let matrix = matrix / scale;
        if matrix.iter().all(|v| v.is_finite()) {
            Some(Self { matrix })
        } else {
            None
        }
    }

    pub fn from_row_major(values: [f64; 9]) -> Option<Self> {
        Self::from_matrix(Matrix3::from_row_slice(&values))
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        let mut matrix = Matrix3::identity();
        matrix[(0, 2)] = dx;
        matrix[(1, 2)] = dy;
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn to_row_major(&self) -> [f64; 9] {
        let m = &self.matrix;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    /// Map a point. `None` when it lands on the line at infinity.
    pub fn transform(&self, point: Point2<f64>) -> Option<Point2<f64>> {
        let mapped = self.matrix * Vector3::new(point.x, point.y, 1.0);
        if mapped.z.abs() < W_EPSILON {
            return None;
        }
        Some(Point2::new(mapped.x / mapped.z, mapped.y / mapped.z))
    }

    pub fn inverse(&self) -> Option<Homography> {
        self.matrix.try_inverse().and_then(Self::from_matrix)
    }

    /// Finite, invertible and not numerically collapsed.
    pub fn is_well_conditioned(&self) -> bool {
        let determinant = self.matrix.determinant();
        determinant.is_finite() && determinant.abs() > 1e-8 && self.inverse().is_some()
    }

    /// Whether a `width` x `height` frame maps to something a camera could
    /// have seen: every corner stays in front (`w > 0`), the corners form a
    /// convex quadrilateral with the original winding, and the area changes
    /// by no more than [`MAX_FRAME_AREA_CHANGE`] either way.
    pub fn keeps_frame_shape(&self, width: u32, height: u32) -> bool {
        let (w, h) = (f64::from(width), f64::from(height));
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

        let mut mapped = [Point2::origin(); 4];
        for (slot, &(x, y)) in corners.iter().enumerate() {
            let projected = self.matrix * Vector3::new(x, y, 1.0);
            if projected.z <= W_EPSILON || !projected.z.is_finite() {
                return false;
            }
            mapped[slot] = Point2::new(projected.x / projected.z, projected.y / projected.z);
        }

        let convex = (0..4).all(|i| {
            let (a, b, c) = (mapped[i], mapped[(i + 1) % 4], mapped[(i + 2) % 4]);
            cross(a, b, c) > COLLINEAR_EPSILON
        });
        if !convex {
            return false;
        }

        let area = (0..4)
            .map(|i| {
                let (a, b) = (mapped[i], mapped[(i + 1) % 4]);
                a.x * b.y - b.x * a.y
            })
            .sum::<f64>()
            / 2.0;
        let ratio = area / (w * h).max(1.0);
        ratio.is_finite() && (1.0 / MAX_FRAME_AREA_CHANGE..=MAX_FRAME_AREA_CHANGE).contains(&ratio)
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// RANSAC settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Maximum reprojection error in pixels for a correspondence to count as an inlier
    pub reprojection_threshold: f64,
    pub max_iterations: usize,
    /// Probability of having drawn at least one all-inlier sample before stopping early
    pub confidence: f64,
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reprojection_threshold: 5.0,
            max_iterations: 2000,
            confidence: 0.995,
            min_inliers: SAMPLE_SIZE,
            seed: DEFAULT_RANSAC_SEED,
        }
    }
}

/// Best model and which correspondences support it.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyEstimate {
    pub homography: Homography,
    pub inliers: Vec<bool>,
}

impl HomographyEstimate {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&inlier| inlier).count()
    }
}

/// Least-squares homography mapping `src[i]` onto `dst[i]`.
///
/// Needs at least four correspondences; returns `None` when the system
/// has no usable solution.
pub fn fit_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() < SAMPLE_SIZE || src.len() != dst.len() {
        return None;
    }

    let (src_norm, src_t) = normalize_points(src)?;
    let (dst_norm, dst_t) = normalize_points(dst)?;

    let n = src_norm.len();
    // Pad to at least 9 rows so the thin SVD still yields the null vector
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, (s, d)) in src_norm.iter().zip(dst_norm.iter()).enumerate() {
        let r = 2 * i;
        a.row_mut(r).copy_from_slice(&[
            -s.x,
            -s.y,
            -1.0,
            0.0,
            0.0,
            0.0,
            s.x * d.x,
            s.y * d.x,
            d.x,
        ]);
        a.row_mut(r + 1).copy_from_slice(&[
            0.0,
            0.0,
            0.0,
            -s.x,
            -s.y,
            -1.0,
            s.x * d.y,
            s.y * d.y,
            d.y,
        ]);
    }

    let svd = SVD::new(a, false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.imin();
    let h = v_t.row(smallest);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    // H = T_dst^-1 * H_norm * T_src
    let dst_t_inv = dst_t.try_inverse()?;
    Homography::from_matrix(dst_t_inv * h_norm * src_t)
}

/// Hartley normalisation: returns the moved points and the matrix that moves them.
fn normalize_points(points: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mean_distance = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_distance < 1e-10 {
        return None;
    }

    let scale = std::f64::consts::SQRT_2 / mean_distance;
    let normalized = points
        .iter()
        .map(|p| Point2::new((p.x - cx) * scale, (p.y - cy) * scale))
        .collect();
    let transform = Matrix3::new(
        scale,
        0.0,
        -cx * scale,
        0.0,
        scale,
        -cy * scale,
        0.0,
        0.0,
        1.0,
    );

    Some((normalized, transform))
}

/// Twice the signed area of triangle `abc`; positive when clockwise on screen.
fn cross(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// True if two of the points (nearly) coincide or any three are (nearly)
/// on one line.
fn is_degenerate(points: &[Point2<f64>; SAMPLE_SIZE]) -> bool {
    let min_separation_sq = MIN_POINT_SEPARATION * MIN_POINT_SEPARATION;
    let crowded = (0..SAMPLE_SIZE).any(|i| {
        (i + 1..SAMPLE_SIZE).any(|j| (points[i] - points[j]).norm_squared() < min_separation_sq)
    });
    crowded
        || TRIPLES.iter().any(|&[a, b, c]| {
            cross(points[a], points[b], points[c]).abs() < COLLINEAR_EPSILON
        })
}

/// True if some triangle of the sample is mirrored between the two photos.
/// No camera motion turns a scene inside out, so such a sample holds a
/// wrong match.
fn flips_orientation(
    src: &[Point2<f64>; SAMPLE_SIZE],
    dst: &[Point2<f64>; SAMPLE_SIZE],
) -> bool {
    TRIPLES.iter().any(|&[a, b, c]| {
        cross(src[a], src[b], src[c]) * cross(dst[a], dst[b], dst[c]) <= 0.0
    })
}

/// Random-sample-consensus homography estimator.
#[derive(Debug, Clone, Default)]
pub struct RansacSolver {
    config: RansacConfig,
}

impl RansacSolver {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    fn score(
        &self,
        model: &Homography,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> (Vec<bool>, usize) {
        let threshold_sq = self.config.reprojection_threshold.powi(2);
        let mask: Vec<bool> = src
            .iter()
            .zip(dst.iter())
            .map(|(s, d)| {
                model
                    .transform(*s)
                    .map(|p| (p - *d).norm_squared() <= threshold_sq)
                    .unwrap_or(false)
            })
            .collect();
        let count = mask.iter().filter(|&&inlier| inlier).count();
        (mask, count)
    }

    /// Iterations needed to hit the confidence target at the given inlier ratio.
    fn required_iterations(&self, inliers: usize, total: usize) -> usize {
        let ratio = inliers as f64 / total as f64;
        let all_inlier_sample = ratio.powi(SAMPLE_SIZE as i32);
        if all_inlier_sample >= 1.0 - f64::EPSILON {
            return 0;
        }
        if all_inlier_sample <= f64::EPSILON {
            return self.config.max_iterations;
        }

        let needed = (1.0 - self.config.confidence).ln() / (1.0 - all_inlier_sample).ln();
        if needed.is_finite() && needed >= 0.0 {
            (needed.ceil() as usize).min(self.config.max_iterations)
        } else {
            self.config.max_iterations
        }
    }
}

impl HomographySolver for RansacSolver {
    fn estimate(
        &self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<HomographyEstimate, AlignmentError> {
        let total = src.len().min(dst.len());
        if total < SAMPLE_SIZE {
            return Err(AlignmentError::InsufficientMatches {
                found: total,
                required: SAMPLE_SIZE,
            });
        }
        let (src, dst) = (&src[..total], &dst[..total]);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Option<(Homography, Vec<bool>, usize)> = None;
        let mut budget = self.config.max_iterations;
        let mut iteration = 0;

        while iteration < budget {
            iteration += 1;

            let picked = rand::seq::index::sample(&mut rng, total, SAMPLE_SIZE);
            let mut sample_src = [Point2::origin(); SAMPLE_SIZE];
            let mut sample_dst = [Point2::origin(); SAMPLE_SIZE];
            for (slot, index) in picked.iter().enumerate() {
                sample_src[slot] = src[index];
                sample_dst[slot] = dst[index];
            }
            if is_degenerate(&sample_src)
                || is_degenerate(&sample_dst)
                || flips_orientation(&sample_src, &sample_dst)
            {
                continue;
            }

            let Some(model) = fit_homography(&sample_src, &sample_dst) else {
                continue;
            };
            let (mask, count) = self.score(&model, src, dst);

            if best.as_ref().map_or(true, |(_, _, best_count)| count > *best_count) {
                budget = self.required_iterations(count, total).max(iteration);
                best = Some((model, mask, count));
            }
        }

        let (mut homography, mut inliers, mut count) =
            best.ok_or(AlignmentError::DegenerateConfiguration)?;

        debug!(iterations = iteration, inliers = count, total, "ransac finished");

        if count < self.config.min_inliers {
            return Err(AlignmentError::InsufficientInliers {
                found: count,
                required: self.config.min_inliers,
            });
        }

        let (inlier_src, inlier_dst): (Vec<_>, Vec<_>) = src
            .iter()
            .zip(dst.iter())
            .zip(inliers.iter())
            .filter(|(_, inlier)| **inlier)
            .map(|((s, d), _)| (*s, *d))
            .unzip();
        if let Some(refit) = fit_homography(&inlier_src, &inlier_dst) {
            let (refit_mask, refit_count) = self.score(&refit, src, dst);
            if refit_count >= count {
                homography = refit;
                inliers = refit_mask;
                count = refit_count;
            }
        }

        if !homography.is_well_conditioned() {
            return Err(AlignmentError::SingularHomography);
        }

        debug!(inliers = count, "homography accepted");
        Ok(HomographyEstimate {
            homography,
            inliers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(count: usize) -> Vec<Point2<f64>> {
        (0..count)
            .map(|i| {
                let x = (i % 7) as f64 * 37.0 + (i / 7) as f64 * 3.0 + 10.0;
                let y = (i / 7) as f64 * 41.0 + (i % 7) as f64 * 5.0 + 15.0;
                Point2::new(x, y)
            })
            .collect()
    }

    fn projective() -> Homography {
        Homography::from_row_major([1.02, 0.05, 12.0, -0.03, 0.98, -7.5, 1e-4, -5e-5, 1.0])
            .unwrap()
    }

    fn map_all(h: &Homography, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        points.iter().map(|p| h.transform(*p).unwrap()).collect()
    }

    fn assert_close(a: &Homography, b: &Homography, points: &[Point2<f64>], tolerance: f64) {
        for p in points {
            let (pa, pb) = (a.transform(*p).unwrap(), b.transform(*p).unwrap());
            assert!(
                (pa - pb).norm() < tolerance,
                "{:?} vs {:?} at {:?}",
                pa,
                pb,
                p
            );
        }
    }

    #[test]
    fn translation_moves_points() {
        let h = Homography::translation(5.0, -3.0);
        assert_eq!(h.transform(Point2::new(1.0, 1.0)), Some(Point2::new(6.0, -2.0)));
        assert_eq!(h.to_row_major(), [1.0, 0.0, 5.0, 0.0, 1.0, -3.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn inverse_undoes_transform() {
        let h = projective();
        let inverse = h.inverse().unwrap();
        let p = Point2::new(120.0, 80.0);
        let back = inverse.transform(h.transform(p).unwrap()).unwrap();
        assert!((back - p).norm() < 1e-9);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let h = Homography::from_row_major([1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(h.inverse().is_none());
        assert!(!h.is_well_conditioned());
    }

    #[test]
    fn dlt_recovers_exact_model_from_four_points() {
        let src = vec![
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
        ];
        let h = projective();
        let fitted = fit_homography(&src, &map_all(&h, &src)).unwrap();
        assert_close(&fitted, &h, &grid(20), 1e-6);
    }

    #[test]
    fn dlt_rejects_coincident_points() {
        let src = vec![Point2::new(3.0, 3.0); 4];
        assert!(fit_homography(&src, &src).is_none());
    }

    #[test]
    fn ransac_ignores_outliers() {
        let h = projective();
        let mut src = grid(35);
        let mut dst = map_all(&h, &src);
        // Ten wildly wrong correspondences
        for i in 0..10 {
            src.push(Point2::new(20.0 * i as f64, 300.0 - 25.0 * i as f64));
            dst.push(Point2::new(400.0 - 31.0 * i as f64, 17.0 * i as f64));
        }

        let estimate = RansacSolver::default().estimate(&src, &dst).unwrap();
        assert_close(&estimate.homography, &h, &grid(35), 0.5);
        assert!(estimate.inliers[..35].iter().all(|&inlier| inlier));
        assert!(estimate.inlier_count() >= 35);
    }

    #[test]
    fn ransac_is_deterministic() {
        let h = projective();
        let src = grid(30);
        let mut dst = map_all(&h, &src);
        dst[3] = Point2::new(0.0, 0.0);
        dst[17] = Point2::new(999.0, 5.0);

        let solver = RansacSolver::default();
        assert_eq!(
            solver.estimate(&src, &dst).unwrap(),
            solver.estimate(&src, &dst).unwrap()
        );
    }

    #[test]
    fn collinear_matches_are_degenerate() {
        let src: Vec<_> = (0..10).map(|i| Point2::new(i as f64 * 10.0, 5.0)).collect();
        let dst = src.clone();
        assert_eq!(
            RansacSolver::default().estimate(&src, &dst),
            Err(AlignmentError::DegenerateConfiguration)
        );
    }

    #[test]
    fn near_duplicate_points_are_degenerate() {
        let spread = [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, 0.0),
            Point2::new(50.0, 40.0),
            Point2::new(0.0, 40.0),
        ];
        assert!(!is_degenerate(&spread));

        let mut crowded = spread;
        crowded[3] = Point2::new(51.5, 41.0);
        assert!(is_degenerate(&crowded));
    }

    #[test]
    fn mirrored_sample_is_rejected() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, 0.0),
            Point2::new(50.0, 40.0),
            Point2::new(0.0, 40.0),
        ];
        let shifted = src.map(|p| Point2::new(p.x + 7.0, p.y - 3.0));
        assert!(!flips_orientation(&src, &shifted));

        let mirrored = src.map(|p| Point2::new(100.0 - p.x, p.y));
        assert!(flips_orientation(&src, &mirrored));
    }

    #[test]
    fn clustered_matches_do_not_produce_a_model() {
        // Four corners of a square, each reported several times a pixel
        // apart, all matched onto one corner of the other photo
        let mut src = Vec::new();
        for &(x, y) in &[(50.0, 50.0), (149.0, 50.0), (149.0, 149.0), (50.0, 149.0)] {
            for &(dx, dy) in &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.5)] {
                src.push(Point2::new(x + dx, y + dy));
            }
        }
        let dst: Vec<_> = (0..src.len())
            .map(|i| Point2::new(50.0 + (i % 2) as f64, 50.0 + (i % 3) as f64 * 0.5))
            .collect();

        assert_eq!(
            RansacSolver::default().estimate(&src, &dst),
            Err(AlignmentError::DegenerateConfiguration)
        );
    }

    #[test]
    fn plausible_motions_keep_the_frame() {
        assert!(Homography::identity().keeps_frame_shape(400, 300));
        assert!(Homography::translation(-12.0, 30.0).keeps_frame_shape(400, 300));
        assert!(projective().keeps_frame_shape(400, 300));

        let (sin, cos) = 0.1f64.sin_cos();
        let rotation =
            Homography::from_row_major([cos, -sin, 20.0, sin, cos, -15.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(rotation.keeps_frame_shape(400, 300));
    }

    #[test]
    fn collapsing_or_mirroring_models_break_the_frame() {
        // Folds the frame onto a sliver, with the horizon crossing it
        let folded = Homography::from_row_major([
            -0.256, -0.257, 50.4, -0.254, -0.257, 50.1, -0.0051, -0.0051, 1.0,
        ])
        .unwrap();
        assert!(!folded.keeps_frame_shape(400, 400));

        let mirrored =
            Homography::from_row_major([-1.0, 0.0, 400.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(!mirrored.keeps_frame_shape(400, 400));

        let shrunk =
            Homography::from_row_major([0.1, 0.0, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(!shrunk.keeps_frame_shape(400, 400));
    }

    #[test]
    fn too_little_support_is_rejected() {
        let src = grid(10);
        let dst = map_all(&projective(), &src);
        let solver = RansacSolver::new(RansacConfig {
            min_inliers: 20,
            ..RansacConfig::default()
        });
        assert_eq!(
            solver.estimate(&src, &dst),
            Err(AlignmentError::InsufficientInliers {
                found: 10,
                required: 20
            })
        );
    }

    #[test]
    fn fewer_than_four_matches_is_an_error() {
        let src = grid(3);
        assert!(matches!(
            RansacSolver::default().estimate(&src, &src),
            Err(AlignmentError::InsufficientMatches { found: 3, .. })
        ));
    }
}
