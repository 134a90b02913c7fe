//! Raster buffer aliases and colour conversion.
//!
//! Every stage works on owned `image` buffers: colour data is always RGBA8,
//! masks and intensity maps are single-channel 8-bit.

use image::{GrayImage, ImageBuffer, RgbaImage};

/// Decoded colour photo, RGBA with 8 bits per channel.
pub type RasterImage = RgbaImage;

/// Single-channel intensity map or binary mask.
pub type GrayRaster = GrayImage;

/// Rec. 601 luma in 14-bit fixed point, rounded.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + (1 << 13)) >> 14) as u8
}

/// Convert an RGBA image to grayscale, ignoring alpha.
pub fn to_grayscale(image: &RasterImage) -> GrayRaster {
    let (width, height) = image.dimensions();
    let mut gray = ImageBuffer::new(width, height);
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b, _] = src.0;
        *dst = image::Luma([luma(r, g, b)]);
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn luma_of_extremes() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
    }

    #[test]
    fn luma_weights_green_highest() {
        assert!(luma(0, 255, 0) > luma(255, 0, 0));
        assert!(luma(255, 0, 0) > luma(0, 0, 255));
    }

    #[test]
    fn grayscale_keeps_dimensions() {
        let image = RgbaImage::from_pixel(7, 3, Rgba([10, 20, 30, 255]));
        let gray = to_grayscale(&image);
        assert_eq!(gray.dimensions(), (7, 3));
        assert_eq!(gray.get_pixel(6, 2)[0], luma(10, 20, 30));
    }
}
