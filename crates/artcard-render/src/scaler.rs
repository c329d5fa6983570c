//! Bitmap scaling into a fixed box
//!
//! Pure and synchronous. Callers cache the result; nothing here keeps state.

use crate::bitmap::{LoadedImage, ScaledImage};
use image::imageops::{self, FilterType};
use std::time::Instant;
use tracing::debug;

/// How an image is fitted into its target box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitPolicy {
    /// Fill the box exactly, cropping the overflowing axis around the center.
    #[default]
    CenterCrop,
    /// Fit entirely inside the box; never upscales.
    Contain,
}

/// Fit `image` into `max_width` x `max_height` with the card's band policy.
pub fn fit(image: &LoadedImage, max_width: i32, max_height: i32) -> ScaledImage {
    fit_with(image, max_width, max_height, FitPolicy::CenterCrop)
}

/// Fit `image` into `max_width` x `max_height`.
///
/// Non-positive targets and empty sources produce an empty image.
pub fn fit_with(
    image: &LoadedImage,
    max_width: i32,
    max_height: i32,
    policy: FitPolicy,
) -> ScaledImage {
    if max_width <= 0 || max_height <= 0 || image.is_empty() {
        return ScaledImage::empty();
    }

    let start = Instant::now();
    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = (max_width as u32, max_height as u32);

    let pixels = match policy {
        FitPolicy::CenterCrop => {
            let (x, y, w, h) = crop_region(src_w, src_h, dst_w, dst_h);
            let cropped = imageops::crop_imm(image.pixels(), x, y, w, h).to_image();
            if (w, h) == (dst_w, dst_h) {
                cropped
            } else {
                imageops::resize(&cropped, dst_w, dst_h, FilterType::Triangle)
            }
        }
        FitPolicy::Contain => {
            let (w, h) = contain_dimensions(src_w, src_h, dst_w, dst_h);
            if (w, h) == (src_w, src_h) {
                image.pixels().clone()
            } else {
                imageops::resize(image.pixels(), w, h, FilterType::Triangle)
            }
        }
    };

    debug!(
        "Scaled {}x{} -> {}x{} ({:?}) in {:?}",
        src_w,
        src_h,
        pixels.width(),
        pixels.height(),
        policy,
        start.elapsed()
    );

    ScaledImage::new(pixels)
}

/// Largest centered region of the source with the target's aspect ratio.
fn crop_region(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32, u32, u32) {
    let target_aspect = dst_w as f64 / dst_h as f64;
    let aspect = src_w as f64 / src_h as f64;

    if aspect > target_aspect {
        // Too wide: trim left and right
        let w = ((src_h as f64 * target_aspect).round() as u32).clamp(1, src_w);
        ((src_w - w) / 2, 0, w, src_h)
    } else {
        // Too tall: trim top and bottom
        let h = ((src_w as f64 / target_aspect).round() as u32).clamp(1, src_h);
        (0, (src_h - h) / 2, src_w, h)
    }
}

/// Dimensions that fit inside the box while keeping the aspect ratio.
fn contain_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let ratio = (width as f64 / max_width as f64).max(height as f64 / max_height as f64);

    if ratio <= 1.0 {
        // Already fits, no upscaling
        (width, height)
    } else {
        (
            ((width as f64 / ratio) as u32).max(1),
            ((height as f64 / ratio) as u32).max(1),
        )
    }
}
