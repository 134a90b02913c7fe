//! # Backend Module
//!
//! The set of image-processing capabilities one detection run uses.
//!
//! ## Capabilities
//! - **FeatureDetector** - keypoints with binary descriptors (ORB)
//! - **DescriptorMatcher** - nearest-neighbour Hamming matching
//! - **HomographySolver** - RANSAC over 4-point DLT
//! - **Warper** - perspective resampling
//! - **Morphology** - erode/dilate, open/close (imageproc)
//! - **ContourExtractor** - external contours (imageproc)
//!
//! The pipeline only ever talks to these traits, so one code path serves
//! every host; a host swaps whichever capability it has a better version of.

mod traits;

pub use traits::{
    ContourExtractor, DescriptorMatcher, FeatureDetector, HomographySolver, Morphology, Warper,
};

use crate::core::align::{AlignConfig, BruteForceMatcher, OrbDetector, PerspectiveWarper, RansacSolver};
use crate::core::regions::ImageprocContours;
use crate::core::threshold::ImageprocMorphology;

/// One implementation of every capability.
pub struct Backend {
    pub detector: Box<dyn FeatureDetector>,
    pub matcher: Box<dyn DescriptorMatcher>,
    pub solver: Box<dyn HomographySolver>,
    pub warper: Box<dyn Warper>,
    pub morphology: Box<dyn Morphology>,
    pub contours: Box<dyn ContourExtractor>,
}

impl Backend {
    /// Pure-Rust implementations, configured from `config`.
    pub fn native(config: &AlignConfig) -> Self {
        Self {
            detector: Box::new(OrbDetector::new(config.orb.clone())),
            matcher: Box::new(BruteForceMatcher::new()),
            solver: Box::new(RansacSolver::new(config.ransac.clone())),
            warper: Box::new(PerspectiveWarper::new(config.interpolation)),
            morphology: Box::new(ImageprocMorphology),
            contours: Box::new(ImageprocContours),
        }
    }

    pub fn with_detector(mut self, detector: impl FeatureDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn with_matcher(mut self, matcher: impl DescriptorMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_solver(mut self, solver: impl HomographySolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    pub fn with_warper(mut self, warper: impl Warper + 'static) -> Self {
        self.warper = Box::new(warper);
        self
    }

    pub fn with_morphology(mut self, morphology: impl Morphology + 'static) -> Self {
        self.morphology = Box::new(morphology);
        self
    }

    pub fn with_contours(mut self, contours: impl ContourExtractor + 'static) -> Self {
        self.contours = Box::new(contours);
        self
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::native(&AlignConfig::default())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
