//! # Error Module
//!
//! Error types for the difference detector.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - which input, what went wrong
//! - **Terminal per run** - no partial diff list is ever returned alongside an error
//! - **Recovery hints** - alignment failures suggest retaking the photos

use crate::core::geometry::SelectionRect;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum SpotDiffError {
    #[error("Failed to process images: {0}")]
    Decode(#[from] DecodeError),

    #[error("Alignment error: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Selection {selection} does not overlap the image")]
    InvalidRegion { selection: SelectionRect },

    #[error("Invalid sensitivity: {value} (must be 0-100)")]
    InvalidSensitivity { value: i64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while loading an input image
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read image {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image format: {source_name}")]
    UnsupportedFormat { source_name: String },

    #[error("Failed to decode image {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },

    #[error("Image is empty: {source_name}")]
    EmptyImage { source_name: String },
}

/// Errors that occur while registering the second photo onto the first
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    #[error(
        "Only {found} feature matches found, at least {required} are needed. Try retaking the photos."
    )]
    InsufficientMatches { found: usize, required: usize },

    #[error(
        "Only {found} matches agree on a camera motion, at least {required} are needed. Try retaking the photos."
    )]
    InsufficientInliers { found: usize, required: usize },

    #[error("Matched features are degenerate (collinear, coincident or implying an impossible camera motion)")]
    DegenerateConfiguration,

    #[error("Estimated homography is singular")]
    SingularHomography,
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, SpotDiffError>;
