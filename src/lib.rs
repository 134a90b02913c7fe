//! # spot-diff
//!
//! Finds the regions that changed between two photos of the same scene
//! taken from a hand-held camera.
//!
//! ## How It Works
//! The second photo is registered onto the first (ORB features, RANSAC
//! homography, perspective warp), the two are differenced inside the
//! user's selection, the difference is thresholded by a 0-100 sensitivity
//! and cleaned with morphology, and the bounding boxes of what remains
//! are reported in the first photo's pixel coordinates.
//!
//! ## Architecture
//! - `core` - The detection engine (UI-agnostic)
//! - `events` - Progress reporting over channels
//! - `error` - Error types that name the failing input or stage
//!
//! ## Example
//! ```rust,ignore
//! use spot_diff::{detect_differences, SelectionRect};
//!
//! let report = detect_differences("before.jpg", "after.jpg", SelectionRect::new(0, 0, 800, 600), 50)?;
//! for rect in report.diffs {
//!     println!("{}", rect);
//! }
//! ```

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::{
    DetectionConfig, DetectionResult, DiffPipeline, DiffRect, DiffReport, ImageSource,
    SelectionRect, Sensitivity,
};
pub use error::{AlignmentError, DecodeError, Result, SpotDiffError};

/// Compare two photos with the default configuration.
///
/// `sensitivity` must be in `0..=100`. Returns the changed regions of
/// `image1`, or the first error any stage hit.
pub fn detect_differences(
    image1: impl Into<ImageSource>,
    image2: impl Into<ImageSource>,
    selection: SelectionRect,
    sensitivity: i64,
) -> Result<DiffReport> {
    let sensitivity = Sensitivity::new(sensitivity)?;
    let pipeline = DiffPipeline::builder().build()?;
    let result = pipeline.detect(&image1.into(), &image2.into(), selection, sensitivity)?;
    Ok(result.into_report())
}

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or host app).
/// Filtering follows `RUST_LOG`. Returns `false` if a global subscriber was
/// already installed.
pub fn init_tracing() -> bool {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sensitivity_fails_before_loading() {
        // Paths do not exist; the sensitivity check must come first
        let result = detect_differences(
            "/nonexistent/a.png",
            "/nonexistent/b.png",
            SelectionRect::new(0, 0, 100, 100),
            101,
        );
        assert!(matches!(
            result,
            Err(SpotDiffError::InvalidSensitivity { value: 101 })
        ));
    }

    #[test]
    fn tracing_can_be_initialised_twice() {
        init_tracing();
        assert!(!init_tracing());
    }
}
