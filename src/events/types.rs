//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};

/// All events emitted while comparing a photo pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Run-level lifecycle
    Pipeline(PipelineEvent),
    /// Per-stage results
    Stage(StageEvent),
}

/// Run-level events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A comparison has started
    Started,
    /// Moving to a new stage
    StageChanged { stage: PipelineStage },
    /// The comparison finished with a result
    Completed { summary: PipelineSummary },
    /// The comparison aborted; no result will follow
    Failed { message: String },
}

/// Stages of one comparison, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Loading,
    Aligning,
    Differencing,
    Cleaning,
    Extracting,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Loading,
        PipelineStage::Aligning,
        PipelineStage::Differencing,
        PipelineStage::Cleaning,
        PipelineStage::Extracting,
    ];
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Loading => write!(f, "Loading"),
            PipelineStage::Aligning => write!(f, "Aligning"),
            PipelineStage::Differencing => write!(f, "Differencing"),
            PipelineStage::Cleaning => write!(f, "Cleaning"),
            PipelineStage::Extracting => write!(f, "Extracting"),
        }
    }
}

/// What each stage produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageEvent {
    /// Both photos decoded
    Loaded {
        width: u32,
        height: u32,
        second_width: u32,
        second_height: u32,
    },
    /// Second photo registered onto the first
    Aligned {
        keypoints: usize,
        second_keypoints: usize,
        good_matches: usize,
        inliers: usize,
    },
    /// Difference map computed over the clamped selection
    Differenced { width: u32, height: u32, peak: u8 },
    /// Mask thresholded and cleaned
    Cleaned {
        threshold: u8,
        foreground_pixels: usize,
    },
    /// Regions extracted from the mask
    Extracted { regions: usize },
}

/// Summary of a finished comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Number of difference rectangles reported
    pub regions: usize,
    /// Good matches that supported the homography
    pub inliers: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}
