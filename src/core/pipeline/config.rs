//! Detection settings shared by the library and the CLI.

use crate::core::align::{AlignConfig, MIN_GOOD_MATCHES};
use crate::core::difference::DiffReduction;
use crate::error::{Result, SpotDiffError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every tunable of one detection run.
///
/// Missing fields in a JSON config take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub align: AlignConfig,
    pub reduction: DiffReduction,
    /// Side of the square structuring element (odd)
    pub kernel_size: u8,
    /// Boxes need width and height strictly above this
    pub min_region_size: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            align: AlignConfig::default(),
            reduction: DiffReduction::default(),
            kernel_size: 3,
            min_region_size: 10,
        }
    }
}

impl DetectionConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SpotDiffError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| SpotDiffError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(SpotDiffError::Config(message));

        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return invalid(format!(
                "kernel_size must be odd and at least 1, got {}",
                self.kernel_size
            ));
        }

        let orb = &self.align.orb;
        if orb.max_features == 0 {
            return invalid("max_features must be at least 1".to_string());
        }
        if orb.pyramid_levels == 0 {
            return invalid("pyramid_levels must be at least 1".to_string());
        }
        if !(orb.scale_factor.is_finite() && orb.scale_factor > 1.0) {
            return invalid(format!(
                "scale_factor must be greater than 1, got {}",
                orb.scale_factor
            ));
        }

        if self.align.max_good_matches < MIN_GOOD_MATCHES {
            return invalid(format!(
                "max_good_matches must be at least {}, got {}",
                MIN_GOOD_MATCHES, self.align.max_good_matches
            ));
        }

        let ransac = &self.align.ransac;
        if !(ransac.reprojection_threshold.is_finite() && ransac.reprojection_threshold > 0.0) {
            return invalid(format!(
                "reprojection_threshold must be positive, got {}",
                ransac.reprojection_threshold
            ));
        }
        if ransac.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".to_string());
        }
        if !(ransac.confidence > 0.0 && ransac.confidence < 1.0) {
            return invalid(format!(
                "confidence must be between 0 and 1, got {}",
                ransac.confidence
            ));
        }
        if ransac.min_inliers < MIN_GOOD_MATCHES {
            return invalid(format!(
                "min_inliers must be at least {}, got {}",
                MIN_GOOD_MATCHES, ransac.min_inliers
            ));
        }

        Ok(())
    }
}
