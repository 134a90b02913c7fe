//! # Pipeline Module
//!
//! Orchestrates one comparison of a photo pair.
//!
//! ## Pipeline Stages
//! 1. **Load** - Decode both photos (in parallel)
//! 2. **Align** - Register the second photo onto the first
//! 3. **Difference** - Per-pixel difference inside the selection
//! 4. **Clean** - Threshold by sensitivity, open, close
//! 5. **Extract** - Bounding boxes of the remaining regions
//!
//! Any stage error ends the run; there is never a partial result.

mod config;
mod executor;
mod result;

pub use config::DetectionConfig;
pub use executor::{DiffPipeline, DiffPipelineBuilder};
pub use result::{DetectionResult, DetectionStats, DiffReport};
