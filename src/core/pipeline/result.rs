//! What a detection run returns.

use crate::core::align::AlignmentSummary;
use crate::core::geometry::{DiffRect, PixelRect};
use serde::{Deserialize, Serialize};

/// The externally visible result: just the rectangles.
///
/// Order follows the contour scan and carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffReport {
    pub diffs: Vec<DiffRect>,
}

/// Counters collected along the way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub image_width: u32,
    pub image_height: u32,
    /// Selection after clamping to the first photo
    pub region: PixelRect,
    pub alignment: AlignmentSummary,
    /// Intensity a difference had to exceed
    pub threshold: u8,
    /// Foreground pixels left after cleaning
    pub foreground_pixels: usize,
    pub contours: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Rectangles plus run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub diffs: Vec<DiffRect>,
    pub stats: DetectionStats,
}

impl DetectionResult {
    pub fn into_report(self) -> DiffReport {
        DiffReport { diffs: self.diffs }
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_to_diffs_list() {
        let report = DiffReport {
            diffs: vec![DiffRect::new(1, 2, 30, 40)],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"diffs":[{"x":1,"y":2,"width":30,"height":40}]}"#
        );
    }
}
