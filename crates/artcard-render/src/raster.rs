//! Software rasterizer
//!
//! CPU canvas over an RGBA buffer. Glyphs are rasterized with fontdue when a
//! font is attached; without one, text is skipped.

use crate::Color;
use crate::bitmap::ScaledImage;
use crate::canvas::{Canvas, Rect};
use crate::text::{BOLD_ADVANCE, TextStyle};
use fontdue::Font;
use image::{Rgba, RgbaImage, imageops};
use std::path::Path;
use std::sync::Arc;

/// Canvas backed by an RGBA pixel buffer
pub struct PixelCanvas {
    target: RgbaImage,
    font: Option<Arc<Font>>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target: RgbaImage::new(width, height),
            font: None,
        }
    }

    pub fn with_font(mut self, font: Arc<Font>) -> Self {
        self.font = Some(font);
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.target
    }

    pub fn into_image(self) -> RgbaImage {
        self.target
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        self.target
            .save_with_format(path, image::ImageFormat::Png)
    }

    fn blend(&mut self, x: i64, y: i64, color: Color, coverage: f32) {
        if x < 0 || y < 0 || x >= self.target.width() as i64 || y >= self.target.height() as i64 {
            return;
        }
        let alpha = (color.a * coverage).clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }

        let dst = self.target.get_pixel_mut(x as u32, y as u32);
        let d = Color::from_rgba8(dst.0);
        let out = Color::rgba(
            color.r * alpha + d.r * (1.0 - alpha),
            color.g * alpha + d.g * (1.0 - alpha),
            color.b * alpha + d.b * (1.0 - alpha),
            alpha + d.a * (1.0 - alpha),
        );
        *dst = Rgba(out.to_rgba8());
    }

    fn draw_glyphs(
        &mut self,
        font: &Font,
        x: f32,
        baseline: f32,
        text: &str,
        style: &TextStyle,
        color: Color,
    ) {
        let bold_extra = if style.bold { style.size * BOLD_ADVANCE } else { 0.0 };
        let mut cursor = x;

        for ch in text.chars() {
            let (metrics, coverage) = font.rasterize(ch, style.size);
            let left = (cursor + metrics.xmin as f32).round() as i64;
            let top = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i64;

            let strikes: &[i64] = if style.bold { &[0, 1] } else { &[0] };
            for &offset in strikes {
                for row in 0..metrics.height {
                    for col in 0..metrics.width {
                        let value = coverage[row * metrics.width + col];
                        if value > 0 {
                            self.blend(
                                left + col as i64 + offset,
                                top + row as i64,
                                color,
                                value as f32 / 255.0,
                            );
                        }
                    }
                }
            }

            cursor += metrics.advance_width + bold_extra;
        }
    }
}

impl Canvas for PixelCanvas {
    fn width(&self) -> f32 {
        self.target.width() as f32
    }

    fn height(&self) -> f32 {
        self.target.height() as f32
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() {
            return;
        }
        let x0 = rect.x.round().max(0.0) as i64;
        let y0 = rect.y.round().max(0.0) as i64;
        let x1 = (rect.right().round() as i64).min(self.target.width() as i64);
        let y1 = (rect.bottom().round() as i64).min(self.target.height() as i64);

        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color, 1.0);
            }
        }
    }

    fn draw_image(&mut self, x: f32, y: f32, image: &ScaledImage) {
        if image.is_empty() {
            return;
        }
        imageops::overlay(&mut self.target, image.pixels(), x.round() as i64, y.round() as i64);
    }

    fn draw_text(&mut self, x: f32, baseline: f32, text: &str, style: &TextStyle, color: Color) {
        if let Some(font) = self.font.clone() {
            self.draw_glyphs(&font, x, baseline, text, style, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_clips() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.fill_rect(Rect::new(-5.0, 5.0, 100.0, 100.0), Color::from_hex(0xFF0000));

        let img = canvas.image();
        assert_eq!(img.get_pixel(0, 4).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(0, 5).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(9, 9).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_translucent_fill_blends() {
        let mut canvas = PixelCanvas::new(1, 1);
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE);
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::rgba(0.0, 0.0, 0.0, 0.5));

        let [r, g, b, a] = canvas.image().get_pixel(0, 0).0;
        assert!((127..=128).contains(&r));
        assert_eq!((r, g, a), (b, b, 255));
    }

    #[test]
    fn test_draw_image() {
        let mut canvas = PixelCanvas::new(8, 8);
        let img = ScaledImage::new(RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255])));
        canvas.draw_image(3.0, 4.0, &img);

        assert_eq!(canvas.image().get_pixel(3, 4).0, [0, 255, 0, 255]);
        assert_eq!(canvas.image().get_pixel(4, 5).0, [0, 255, 0, 255]);
        assert_eq!(canvas.image().get_pixel(5, 5).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut canvas = PixelCanvas::new(8, 8);
        canvas.draw_text(0.0, 6.0, "abc", &TextStyle::new(8.0), Color::BLACK);
        assert!(canvas.image().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }
}
