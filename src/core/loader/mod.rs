//! # Loader Module
//!
//! Turns the caller's image handles into RGBA8 rasters.
//!
//! ## Inputs
//! - **Path** - a file on disk (memory-mapped when large)
//! - **Bytes** - an encoded buffer already held in memory (camera capture, upload)
//!
//! ## Performance Optimizations
//! - Uses `zune-jpeg` for 1.5-2x faster JPEG decoding
//! - Decodes both photos of a pair concurrently

mod bytes;
mod decode;

pub use bytes::{read_file_bytes, sniff_format, FileBytes, SniffedFormat};
pub use decode::FastDecoder;

use crate::core::raster::RasterImage;
use crate::error::DecodeError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opaque handle to an encoded photo.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded file on disk
    Path(PathBuf),
    /// Encoded bytes in memory, `name` is used for error messages
    Bytes { name: String, data: Vec<u8> },
}

impl ImageSource {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            name: name.into(),
            data,
        }
    }

    /// Human-readable name used in errors and logs.
    pub fn name(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// Decode this source into an RGBA8 raster.
    pub fn load(&self) -> Result<RasterImage, DecodeError> {
        let image = match self {
            ImageSource::Path(path) => {
                let bytes = read_file_bytes(path)?;
                FastDecoder::decode(&bytes, &self.name())?
            }
            ImageSource::Bytes { name, data } => FastDecoder::decode(data, name)?,
        };

        debug!(
            source = %self,
            width = image.width(),
            height = image.height(),
            "decoded image"
        );
        Ok(image)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::Bytes { name, data } => write!(f, "{} ({} bytes)", name, data.len()),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes("<memory>", data)
    }
}

/// Decode both photos of a pair, in parallel.
///
/// Fails with the first photo's error if both fail.
pub fn load_pair(
    first: &ImageSource,
    second: &ImageSource,
) -> Result<(RasterImage, RasterImage), DecodeError> {
    let (a, b) = rayon::join(|| first.load(), || second.load());
    Ok((a?, b?))
}
