//! Drawing surface abstraction
//!
//! The card draws through `Canvas` so any host surface can back it. Two
//! implementations ship here: `RecordingCanvas` keeps an immediate-mode
//! command list, `PixelCanvas` (in `raster`) rasterizes into RGBA.

use crate::Color;
use crate::bitmap::ScaledImage;
use crate::text::TextStyle;

/// Axis-aligned rectangle in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// A surface the card can draw on
pub trait Canvas {
    fn width(&self) -> f32;

    fn height(&self) -> f32;

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draw `image` with its top-left corner at (`x`, `y`).
    fn draw_image(&mut self, x: f32, y: f32, image: &ScaledImage);

    /// Draw a single line of text whose baseline starts at (`x`, `baseline`).
    fn draw_text(&mut self, x: f32, baseline: f32, text: &str, style: &TextStyle, color: Color);
}

/// Draw command for immediate-mode rendering
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
        bold: bool,
        color: Color,
    },
}

/// Canvas that records what was drawn
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    width: f32,
    height: f32,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::Rect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            color,
        });
    }

    fn draw_image(&mut self, x: f32, y: f32, image: &ScaledImage) {
        self.commands.push(DrawCommand::Image {
            x,
            y,
            width: image.width() as f32,
            height: image.height() as f32,
        });
    }

    fn draw_text(&mut self, x: f32, baseline: f32, text: &str, style: &TextStyle, color: Color) {
        self.commands.push(DrawCommand::Text {
            x,
            y: baseline,
            text: text.to_string(),
            size: style.size,
            bold: style.bold,
            color,
        });
    }
}
