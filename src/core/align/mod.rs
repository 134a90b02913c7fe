//! # Align Module
//!
//! Registers the second photo onto the first so that hand-held camera
//! movement between the two shots does not show up as differences.
//!
//! ## Stages
//! 1. **Detect** - ORB keypoints in both photos
//! 2. **Match** - nearest Hamming descriptor in the second photo for each
//!    first-photo feature, best 50 kept
//! 3. **Estimate** - RANSAC homography (second photo -> first photo),
//!    rejected if it folds, mirrors or collapses the frame
//! 4. **Warp** - resample the second photo onto the first photo's canvas
//!
//! Any failure aborts the run: diffing unaligned hand-held photos flags
//! nearly every edge in the scene.

mod homography;
mod matcher;
mod orb;
mod pyramid;
mod warp;

pub use homography::{
    fit_homography, Homography, HomographyEstimate, RansacConfig, RansacSolver,
    DEFAULT_RANSAC_SEED,
};
pub use matcher::{hamming, select_good_matches, BruteForceMatcher, Match};
pub use orb::{Descriptor, Keypoint, OrbConfig, OrbDetector};
pub use pyramid::{build_pyramid, FastResizer, PyramidLevel};
pub use warp::{Interpolation, PerspectiveWarper, BACKGROUND};

use crate::core::backend::Backend;
use crate::core::raster::{to_grayscale, RasterImage};
use crate::error::AlignmentError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fewest good matches a homography can be estimated from.
pub const MIN_GOOD_MATCHES: usize = 4;

/// Alignment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub orb: OrbConfig,
    /// Matches kept after ranking by descriptor distance
    pub max_good_matches: usize,
    pub ransac: RansacConfig,
    pub interpolation: Interpolation,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            orb: OrbConfig::default(),
            max_good_matches: 50,
            ransac: RansacConfig::default(),
            interpolation: Interpolation::default(),
        }
    }
}

/// What the aligner saw, for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSummary {
    pub reference_keypoints: usize,
    pub moving_keypoints: usize,
    pub matches: usize,
    pub good_matches: usize,
    pub inliers: usize,
    /// Second photo -> first photo, row-major
    pub homography: [f64; 9],
}

/// Second photo resampled into the first photo's frame.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Same dimensions as the reference photo
    pub warped: RasterImage,
    pub homography: Homography,
    pub summary: AlignmentSummary,
}

/// Align `moving` onto `reference`.
pub fn align(
    reference: &RasterImage,
    moving: &RasterImage,
    backend: &Backend,
    max_good_matches: usize,
) -> Result<Alignment, AlignmentError> {
    let (reference_keypoints, moving_keypoints) = rayon::join(
        || backend.detector.detect(&to_grayscale(reference)),
        || backend.detector.detect(&to_grayscale(moving)),
    );
    debug!(
        reference = reference_keypoints.len(),
        moving = moving_keypoints.len(),
        "keypoints detected"
    );

    // Every reference feature looks for its partner in the second photo
    let matches = backend
        .matcher
        .match_descriptors(&reference_keypoints, &moving_keypoints);
    let match_count = matches.len();
    let good = select_good_matches(matches, max_good_matches);
    debug!(matches = match_count, good = good.len(), "descriptors matched");

    if good.len() < MIN_GOOD_MATCHES {
        return Err(AlignmentError::InsufficientMatches {
            found: good.len(),
            required: MIN_GOOD_MATCHES,
        });
    }

    let (src, dst): (Vec<_>, Vec<_>) = good
        .iter()
        .map(|m| {
            let from = &moving_keypoints[m.train];
            let to = &reference_keypoints[m.query];
            (
                Point2::new(f64::from(from.x), f64::from(from.y)),
                Point2::new(f64::from(to.x), f64::from(to.y)),
            )
        })
        .unzip();

    let estimate = backend.solver.estimate(&src, &dst)?;
    let homography = estimate.homography;
    if !homography.keeps_frame_shape(moving.width(), moving.height()) {
        debug!(
            homography = ?homography.to_row_major(),
            "estimated motion folds or collapses the frame"
        );
        return Err(AlignmentError::DegenerateConfiguration);
    }

    let warped = backend
        .warper
        .warp(moving, &homography, reference.width(), reference.height())?;

    let summary = AlignmentSummary {
        reference_keypoints: reference_keypoints.len(),
        moving_keypoints: moving_keypoints.len(),
        matches: match_count,
        good_matches: good.len(),
        inliers: estimate.inlier_count(),
        homography: homography.to_row_major(),
    };
    debug!(inliers = summary.inliers, "second image aligned");

    Ok(Alignment {
        warped,
        homography,
        summary,
    })
}
