//! # Core Module
//!
//! The UI-agnostic difference detection engine.
//!
//! ## Modules
//! - `loader` - Decodes encoded photos into RGBA rasters
//! - `align` - Registers the second photo onto the first
//! - `difference` - Per-pixel difference intensity
//! - `threshold` - Sensitivity threshold and mask cleaning
//! - `regions` - Bounding boxes of changed regions
//! - `backend` - Swappable image-processing capabilities
//! - `pipeline` - Orchestrates the full workflow

pub mod align;
pub mod backend;
pub mod difference;
pub mod geometry;
pub mod loader;
pub mod pipeline;
pub mod raster;
pub mod regions;
pub mod threshold;

// Re-export commonly used types
pub use backend::Backend;
pub use geometry::{DiffRect, PixelRect, SelectionRect};
pub use loader::ImageSource;
pub use pipeline::{DetectionConfig, DetectionResult, DiffPipeline, DiffReport};
pub use raster::RasterImage;
pub use threshold::Sensitivity;
