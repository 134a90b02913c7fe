//! # Geometry Module
//!
//! Rectangles flowing in and out of the detector.
//!
//! - [`SelectionRect`] - caller-supplied area to compare, may be partly or wholly off-image
//! - [`PixelRect`] - a selection clamped to the image, guaranteed non-empty
//! - [`DiffRect`] - one reported difference, in image-1 coordinates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Area of image 1 the user asked to compare.
///
/// Signed so that drag gestures ending off-canvas can be passed through
/// unchanged; [`SelectionRect::clamp_to`] resolves it against the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SelectionRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Selection covering a whole image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        )
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// Returns `None` when nothing of the selection is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let left = i64::from(self.x).max(0);
        let top = i64::from(self.y).max(0);
        let right = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width));
        let bottom = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height));

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

impl fmt::Display for SelectionRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for SelectionRect {
    type Err = String;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid selection '{}': {}", s, e))?;

        match parts.as_slice() {
            [x, y, width, height] => Ok(Self::new(*x, *y, *width, *height)),
            _ => Err(format!(
                "invalid selection '{}': expected x,y,width,height",
                s
            )),
        }
    }
}

/// Non-empty rectangle that lies inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// A region where the two photos differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DiffRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True if both dimensions are strictly above `min_size`.
    pub fn exceeds(&self, min_size: u32) -> bool {
        self.width > min_size && self.height > min_size
    }

    /// True if the rectangle lies inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }

    /// Overlap area with another rectangle.
    pub fn intersection_area(&self, other: &DiffRect) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            return 0;
        }
        u64::from(right - left) * u64::from(bottom - top)
    }
}

impl fmt::Display for DiffRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_inside_is_unchanged() {
        let rect = SelectionRect::new(10, 20, 100, 120).clamp_to(400, 400).unwrap();
        assert_eq!(
            rect,
            PixelRect {
                x: 10,
                y: 20,
                width: 100,
                height: 120
            }
        );
    }

    #[test]
    fn clamp_trims_overhanging_edges() {
        let rect = SelectionRect::new(-50, 350, 200, 200).clamp_to(400, 400).unwrap();
        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 350);
        assert_eq!(rect.width, 150);
        assert_eq!(rect.height, 50);
    }

    #[test]
    fn clamp_off_image_is_none() {
        assert!(SelectionRect::new(500, 0, 100, 100).clamp_to(400, 400).is_none());
        assert!(SelectionRect::new(0, 0, 0, 100).clamp_to(400, 400).is_none());
        assert!(SelectionRect::new(0, 0, -100, 100).clamp_to(400, 400).is_none());
    }

    #[test]
    fn clamp_handles_extreme_values() {
        let rect = SelectionRect::new(i32::MAX - 5, 0, i32::MAX, 10).clamp_to(100, 100);
        assert!(rect.is_none());

        let rect = SelectionRect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX).clamp_to(100, 100);
        assert!(rect.is_none());
    }

    #[test]
    fn selection_parses_from_string() {
        let selection: SelectionRect = "5, 6,100,120".parse().unwrap();
        assert_eq!(selection, SelectionRect::new(5, 6, 100, 120));

        assert!("1,2,3".parse::<SelectionRect>().is_err());
        assert!("a,b,c,d".parse::<SelectionRect>().is_err());
    }

    #[test]
    fn diff_rect_size_filter_is_strict() {
        assert!(DiffRect::new(0, 0, 11, 11).exceeds(10));
        assert!(!DiffRect::new(0, 0, 10, 50).exceeds(10));
        assert!(!DiffRect::new(0, 0, 50, 10).exceeds(10));
    }

    #[test]
    fn intersection_area_of_disjoint_is_zero() {
        let a = DiffRect::new(0, 0, 10, 10);
        let b = DiffRect::new(20, 20, 10, 10);
        assert_eq!(a.intersection_area(&b), 0);
        assert_eq!(a.intersection_area(&DiffRect::new(5, 5, 10, 10)), 25);
    }
}
