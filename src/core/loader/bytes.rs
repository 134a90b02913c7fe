//! Reading encoded image bytes from disk.
//!
//! Large files are memory-mapped to avoid copying camera-sized JPEGs
//! through the kernel; small files use a plain read.

use crate::error::DecodeError;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Minimum file size to use memory-mapped I/O (1MB)
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Read file bytes, memory-mapping files of 1MB or more.
pub fn read_file_bytes(path: &Path) -> Result<FileBytes, DecodeError> {
    let metadata = std::fs::metadata(path).map_err(|e| io_error(path, e))?;

    if metadata.len() >= MMAP_THRESHOLD {
        read_mmap(path)
    } else {
        read_standard(path)
    }
}

fn read_mmap(path: &Path) -> Result<FileBytes, DecodeError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;

    // SAFETY: the mapping is read-only and the returned value owns it; the
    // file is not written by this process while decoding.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_error(path, e))?;

    Ok(FileBytes::Mmap(mmap))
}

fn read_standard(path: &Path) -> Result<FileBytes, DecodeError> {
    let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
    Ok(FileBytes::Vec(bytes))
}

fn io_error(path: &Path, source: std::io::Error) -> DecodeError {
    DecodeError::Io {
        source_name: path.display().to_string(),
        source,
    }
}

/// File bytes that may be either owned or memory-mapped.
pub enum FileBytes {
    Vec(Vec<u8>),
    Mmap(Mmap),
}

impl AsRef<[u8]> for FileBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileBytes::Vec(v) => v,
            FileBytes::Mmap(m) => m,
        }
    }
}

impl std::ops::Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

/// Raster container recognised from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Bmp,
    Tiff,
}

/// Identify the container from magic bytes.
///
/// Returns `None` for anything that is not a raster format the loader
/// can decode, which is much cheaper than attempting a full decode.
pub fn sniff_format(bytes: &[u8]) -> Option<SniffedFormat> {
    if bytes.len() < 8 {
        return None;
    }

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(SniffedFormat::Jpeg);
    }

    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(SniffedFormat::Png);
    }

    if bytes.starts_with(b"GIF8") {
        return Some(SniffedFormat::Gif);
    }

    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some(SniffedFormat::WebP);
    }

    if bytes.starts_with(b"BM") {
        return Some(SniffedFormat::Bmp);
    }

    if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    {
        return Some(SniffedFormat::Tiff);
    }

    None
}
