//! # Threshold Module
//!
//! Turns the difference intensity map into a clean binary mask.
//!
//! ## Steps
//! 1. **Binarize** - pixels brighter than the sensitivity threshold become 255
//! 2. **Open** - erode then dilate, removes isolated noise specks
//! 3. **Close** - dilate then erode, fills pinholes inside real differences
//!
//! ## Sensitivity
//! `0` only reports maximal differences, `100` reports any change at all.
//! The threshold is `T = 255 - round(sensitivity * 2.55)`.

use crate::core::backend::Morphology;
use crate::core::raster::GrayRaster;
use crate::error::SpotDiffError;
use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use serde::{Deserialize, Serialize};

/// Mask value for "different"
pub const FOREGROUND: u8 = 255;

/// User-facing detection sensitivity in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Sensitivity(u8);

impl Sensitivity {
    pub const MIN: Sensitivity = Sensitivity(0);
    pub const MAX: Sensitivity = Sensitivity(100);

    pub fn new(value: i64) -> Result<Self, SpotDiffError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Sensitivity)
            .ok_or(SpotDiffError::InvalidSensitivity { value })
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Intensity a difference must exceed to be reported.
    ///
    /// Integer arithmetic so that `s * 2.55` rounds half up exactly
    /// (`50 -> 127.5 -> 128`, so `T = 127`).
    pub fn threshold(self) -> u8 {
        let scaled = (u32::from(self.0) * 255 + 50) / 100;
        255 - scaled as u8
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Sensitivity(50)
    }
}

impl TryFrom<i64> for Sensitivity {
    type Error = SpotDiffError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Sensitivity::new(value)
    }
}

impl From<Sensitivity> for i64 {
    fn from(sensitivity: Sensitivity) -> Self {
        i64::from(sensitivity.0)
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixels strictly above `threshold` become [`FOREGROUND`], the rest 0.
pub fn binarize(intensity: &GrayRaster, threshold: u8) -> GrayRaster {
    let mut mask = intensity.clone();
    for pixel in mask.pixels_mut() {
        *pixel = Luma([if pixel[0] > threshold { FOREGROUND } else { 0 }]);
    }
    mask
}

/// Morphological opening followed by closing.
pub fn clean(mask: &GrayRaster, morphology: &dyn Morphology, kernel_size: u8) -> GrayRaster {
    let opened = morphology.open(mask, kernel_size);
    morphology.close(&opened, kernel_size)
}

/// Square structuring element via imageproc's chessboard-distance morphology.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocMorphology;

impl ImageprocMorphology {
    /// A `k x k` square is every pixel within chessboard distance `k / 2`.
    fn radius(kernel_size: u8) -> u8 {
        kernel_size / 2
    }
}

impl Morphology for ImageprocMorphology {
    fn erode(&self, mask: &GrayRaster, kernel_size: u8) -> GrayRaster {
        morphology::erode(mask, Norm::LInf, Self::radius(kernel_size))
    }

    fn dilate(&self, mask: &GrayRaster, kernel_size: u8) -> GrayRaster {
        morphology::dilate(mask, Norm::LInf, Self::radius(kernel_size))
    }
}
