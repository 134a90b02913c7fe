//! Capability traits the pipeline is written against.
//!
//! Each trait is one image-processing primitive. A host that has a faster
//! or hardware-backed version of a primitive implements just that trait
//! and swaps it into the [`Backend`](super::Backend).

use crate::core::align::{Homography, HomographyEstimate, Keypoint, Match};
use crate::core::raster::{GrayRaster, RasterImage};
use crate::core::regions::Contour;
use crate::error::AlignmentError;
use nalgebra::Point2;

/// Finds keypoints with binary descriptors in a grayscale image
pub trait FeatureDetector: Send + Sync {
    /// Detect keypoints, in the image's own pixel coordinates.
    fn detect(&self, gray: &GrayRaster) -> Vec<Keypoint>;
}

/// Pairs descriptors of two keypoint sets
pub trait DescriptorMatcher: Send + Sync {
    /// For each query keypoint, the closest train keypoint.
    fn match_descriptors(&self, query: &[Keypoint], train: &[Keypoint]) -> Vec<Match>;
}

/// Robustly fits a homography to point correspondences
pub trait HomographySolver: Send + Sync {
    /// Estimate the transform taking `src[i]` to `dst[i]`.
    fn estimate(
        &self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<HomographyEstimate, AlignmentError>;
}

/// Resamples an image through a homography
pub trait Warper: Send + Sync {
    /// Produce a `width` x `height` canvas where each pixel `p` holds
    /// `source` at `homography⁻¹(p)`.
    fn warp(
        &self,
        source: &RasterImage,
        homography: &Homography,
        width: u32,
        height: u32,
    ) -> Result<RasterImage, AlignmentError>;
}

/// Binary morphology with a square structuring element
pub trait Morphology: Send + Sync {
    fn erode(&self, mask: &GrayRaster, kernel_size: u8) -> GrayRaster;

    fn dilate(&self, mask: &GrayRaster, kernel_size: u8) -> GrayRaster;

    /// Erode then dilate: removes specks smaller than the element.
    fn open(&self, mask: &GrayRaster, kernel_size: u8) -> GrayRaster {
        self.dilate(&self.erode(mask, kernel_size), kernel_size)
    }

    /// Dilate then erode: fills pinholes and narrow gaps.
    fn close(&self, mask: &GrayRaster, kernel_size: u8) -> GrayRaster {
        self.erode(&self.dilate(mask, kernel_size), kernel_size)
    }
}

/// Traces the outer boundaries of foreground regions in a binary mask
pub trait ContourExtractor: Send + Sync {
    /// Outermost contours only; holes and nested regions are not reported.
    fn external_contours(&self, mask: &GrayRaster) -> Vec<Contour>;
}
