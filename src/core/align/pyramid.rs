//! Scale pyramid for multi-scale keypoint detection.
//!
//! Uses fast_image_resize which is 5-14x faster than image crate's resize.
//! Automatically uses AVX2/NEON SIMD when available.

use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{GrayImage, ImageBuffer, Luma};
use tracing::warn;

/// One level of the pyramid.
pub struct PyramidLevel {
    pub image: GrayImage,
    /// Multiply level coordinates by this to get level-0 coordinates
    pub scale: f32,
}

/// Grayscale resizer using SIMD acceleration
pub struct FastResizer {
    resizer: Resizer,
}

impl FastResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Resize a grayscale image with a bilinear filter.
    pub fn resize(
        &mut self,
        gray: &GrayImage,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, String> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err("Invalid source dimensions".to_string());
        }
        if width == 0 || height == 0 {
            return Err("Invalid destination dimensions".to_string());
        }

        let src_image = Image::from_vec_u8(
            gray.width(),
            gray.height(),
            gray.as_raw().clone(),
            PixelType::U8,
        )
        .map_err(|e| format!("Failed to create source image: {}", e))?;

        let mut dst_image = Image::new(width, height, PixelType::U8);

        let options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| format!("Resize failed: {}", e))?;

        let result: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, dst_image.into_vec())
                .ok_or_else(|| "Failed to create result buffer".to_string())?;

        Ok(result)
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build up to `levels` levels, each `scale_factor` times smaller than the last.
///
/// Stops early once a level would be smaller than `min_side` in either
/// dimension. Level 0 is always the input itself.
pub fn build_pyramid(
    gray: &GrayImage,
    levels: u32,
    scale_factor: f32,
    min_side: u32,
) -> Vec<PyramidLevel> {
    let mut pyramid = vec![PyramidLevel {
        image: gray.clone(),
        scale: 1.0,
    }];
    let mut resizer = FastResizer::new();

    for level in 1..levels {
        let scale = scale_factor.powi(level as i32);
        let width = (gray.width() as f32 / scale).round() as u32;
        let height = (gray.height() as f32 / scale).round() as u32;
        if width < min_side || height < min_side {
            break;
        }

        match resizer.resize(gray, width, height) {
            Ok(image) => pyramid.push(PyramidLevel { image, scale }),
            Err(reason) => {
                warn!(level, %reason, "stopping pyramid early");
                break;
            }
        }
    }

    pyramid
}
