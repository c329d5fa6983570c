//! Decoded pixel buffers
//!
//! `LoadedImage` is what an image provider delivers; `ScaledImage` is the
//! band-sized copy the card actually draws. Both are RGBA8.

use image::{DynamicImage, RgbaImage};
use std::sync::Arc;

/// A decoded image as delivered by an image provider
///
/// Cloning is cheap: the pixels are shared read-only, which lets palette
/// extraction read them off the rendering thread.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pixels: Arc<RgbaImage>,
}

impl LoadedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Decode an encoded image (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(img))
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        Self::new(img.to_rgba8())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True if both handles point at the same pixel buffer.
    pub fn same_pixels(&self, other: &LoadedImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// An image resized for drawing into the band
#[derive(Debug, Clone)]
pub struct ScaledImage {
    pixels: RgbaImage,
}

impl ScaledImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Zero-sized result, used for degenerate targets.
    pub fn empty() -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_pixels() {
        let img = LoadedImage::new(RgbaImage::new(4, 4));
        let copy = img.clone();
        assert!(img.same_pixels(&copy));

        let other = LoadedImage::new(RgbaImage::new(4, 4));
        assert!(!img.same_pixels(&other));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(LoadedImage::decode(b"not an image").is_err());
    }

    #[test]
    fn test_empty_scaled_image() {
        let scaled = ScaledImage::empty();
        assert!(scaled.is_empty());
        assert_eq!(scaled.dimensions(), (0, 0));
    }
}
