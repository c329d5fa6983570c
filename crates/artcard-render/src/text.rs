//! Text layout
//!
//! Greedy word wrapping against pluggable font metrics. Layout is a pure
//! function of (text, width, style), so a block computed while measuring is
//! exactly the block drawn later.

use crate::Color;
use crate::canvas::Canvas;
use fontdue::{Font, FontSettings};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Extra advance per glyph for synthetic bold, as a fraction of font size
pub(crate) const BOLD_ADVANCE: f32 = 0.04;

/// Text errors
#[derive(Debug, Error)]
pub enum TextError {
    #[error("Failed to read font {path}: {source}")]
    FontRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse font: {0}")]
    FontLoad(String),
}

/// Text style configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font size in pixels
    pub size: f32,
    /// Text color
    pub color: Color,
    /// Bold weight
    pub bold: bool,
    /// Line height multiplier
    pub line_spacing_mult: f32,
    /// Extra pixels added to every line
    pub line_spacing_add: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 14.0,
            color: Color::CARD_TEXT,
            bold: false,
            line_spacing_mult: 1.0,
            line_spacing_add: 0.0,
        }
    }
}

impl TextStyle {
    pub fn new(size: f32) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn with_line_spacing(mut self, mult: f32, add: f32) -> Self {
        self.line_spacing_mult = mult;
        self.line_spacing_add = add;
        self
    }
}

/// Vertical font metrics at a given size, all positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

impl LineMetrics {
    pub fn line_height(&self) -> f32 {
        self.ascent + self.descent + self.line_gap
    }
}

/// Glyph measurements used by the layout engine
pub trait FontMetrics: Send + Sync + fmt::Debug {
    /// Horizontal advance of `ch` in pixels.
    fn advance(&self, ch: char, size: f32, bold: bool) -> f32;

    /// Vertical metrics at `size`.
    fn line_metrics(&self, size: f32) -> LineMetrics;
}

/// Fixed-advance approximation, used when no font file is configured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMetrics {
    /// Advance as a fraction of font size
    pub advance_ratio: f32,
    pub ascent_ratio: f32,
    pub descent_ratio: f32,
    pub gap_ratio: f32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            advance_ratio: 0.6,
            ascent_ratio: 0.8,
            descent_ratio: 0.2,
            gap_ratio: 0.2,
        }
    }
}

impl FontMetrics for MonospaceMetrics {
    fn advance(&self, _ch: char, size: f32, bold: bool) -> f32 {
        let extra = if bold { BOLD_ADVANCE } else { 0.0 };
        size * (self.advance_ratio + extra)
    }

    fn line_metrics(&self, size: f32) -> LineMetrics {
        LineMetrics {
            ascent: size * self.ascent_ratio,
            descent: size * self.descent_ratio,
            line_gap: size * self.gap_ratio,
        }
    }
}

/// Metrics read from a real font with fontdue
pub struct FontdueMetrics {
    font: Arc<Font>,
}

impl FontdueMetrics {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TextError> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| TextError::FontLoad(e.to_string()))?;
        Ok(Self {
            font: Arc::new(font),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TextError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| TextError::FontRead {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded font {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(&bytes)
    }

    /// The underlying font, for rasterizing glyphs with the same metrics.
    pub fn font(&self) -> Arc<Font> {
        self.font.clone()
    }
}

impl fmt::Debug for FontdueMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontdueMetrics")
            .field("name", &self.font.name())
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl FontMetrics for FontdueMetrics {
    fn advance(&self, ch: char, size: f32, bold: bool) -> f32 {
        let extra = if bold { size * BOLD_ADVANCE } else { 0.0 };
        self.font.metrics(ch, size).advance_width + extra
    }

    fn line_metrics(&self, size: f32) -> LineMetrics {
        match self.font.horizontal_line_metrics(size) {
            Some(m) => LineMetrics {
                ascent: m.ascent,
                descent: -m.descent,
                line_gap: m.line_gap,
            },
            None => MonospaceMetrics::default().line_metrics(size),
        }
    }
}

/// One laid-out line, positioned relative to the block's top-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub top: f32,
    pub baseline: f32,
    pub width: f32,
}

/// Wrapped, measured text ready for drawing
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    lines: Vec<TextLine>,
    max_width: f32,
    line_height: f32,
}

impl TextBlock {
    pub fn empty(max_width: f32) -> Self {
        Self {
            lines: Vec::new(),
            max_width,
            line_height: 0.0,
        }
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Total height: line count times line height.
    pub fn height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }

    /// Width the block was wrapped to.
    pub fn max_width(&self) -> f32 {
        self.max_width
    }

    /// Width of the widest line.
    pub fn width(&self) -> f32 {
        self.lines.iter().map(|l| l.width).fold(0.0, f32::max)
    }

    /// Draw every line with the block's top-left corner at (`x`, `y`).
    pub fn draw(&self, canvas: &mut dyn Canvas, x: f32, y: f32, style: &TextStyle, color: Color) {
        for line in self.lines.iter().filter(|l| !l.text.is_empty()) {
            canvas.draw_text(x + line.x, y + line.baseline, &line.text, style, color);
        }
    }
}

/// Greedy line-wrapping layout engine
#[derive(Debug, Clone)]
pub struct TextLayoutEngine {
    metrics: Arc<dyn FontMetrics>,
}

impl TextLayoutEngine {
    pub fn new(metrics: Arc<dyn FontMetrics>) -> Self {
        Self { metrics }
    }

    pub fn monospace() -> Self {
        Self::new(Arc::new(MonospaceMetrics::default()))
    }

    pub fn line_height(&self, style: &TextStyle) -> f32 {
        let base = self.metrics.line_metrics(style.size).line_height();
        base * style.line_spacing_mult + style.line_spacing_add
    }

    /// Width of `text` on a single line.
    pub fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        text.chars()
            .map(|c| self.metrics.advance(c, style.size, style.bold))
            .sum()
    }

    /// Wrap `text` to `max_width`.
    ///
    /// Newlines are hard breaks and an empty paragraph is a blank line. Runs
    /// of whitespace collapse to one space. A word wider than `max_width`
    /// gets a line of its own and is not broken further.
    pub fn layout(&self, text: &str, max_width: f32, style: &TextStyle) -> TextBlock {
        let max_width = if max_width.is_finite() { max_width.max(0.0) } else { 0.0 };
        if text.trim().is_empty() {
            return TextBlock::empty(max_width);
        }

        let line_height = self.line_height(style);
        let ascent = self.metrics.line_metrics(style.size).ascent;
        let space = self.metrics.advance(' ', style.size, style.bold);

        let mut wrapped: Vec<(String, f32)> = Vec::new();
        for paragraph in text.split('\n') {
            let mut current = String::new();
            let mut current_width = 0.0f32;

            for word in paragraph.split_whitespace() {
                let word_width = self.measure(word, style);
                if current.is_empty() {
                    current.push_str(word);
                    current_width = word_width;
                } else if current_width + space + word_width <= max_width {
                    current.push(' ');
                    current.push_str(word);
                    current_width += space + word_width;
                } else {
                    wrapped.push((std::mem::take(&mut current), current_width));
                    current.push_str(word);
                    current_width = word_width;
                }
            }

            // Also emits the blank line for an empty paragraph
            wrapped.push((current, current_width));
        }

        let lines = wrapped
            .into_iter()
            .enumerate()
            .map(|(i, (text, width))| {
                let top = i as f32 * line_height;
                TextLine {
                    text,
                    x: 0.0,
                    top,
                    baseline: top + ascent,
                    width,
                }
            })
            .collect();

        TextBlock {
            lines,
            max_width,
            line_height,
        }
    }
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::monospace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};

    /// 10px per glyph, 20px lines at size 10
    fn engine() -> TextLayoutEngine {
        TextLayoutEngine::new(Arc::new(MonospaceMetrics {
            advance_ratio: 1.0,
            ascent_ratio: 1.5,
            descent_ratio: 0.5,
            gap_ratio: 0.0,
        }))
    }

    fn texts(block: &TextBlock) -> Vec<&str> {
        block.lines().iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_text_style() {
        let style = TextStyle::new(16.0)
            .with_color(Color::WHITE)
            .with_bold(true);

        assert_eq!(style.size, 16.0);
        assert!(style.bold);
        assert_eq!(style.line_spacing_mult, 1.0);
    }

    #[test]
    fn test_text_measure() {
        let style = TextStyle::new(10.0);
        assert_eq!(engine().measure("Hello", &style), 50.0);
        assert!(engine().measure("Hello", &style.with_bold(true)) > 50.0);
    }

    #[test]
    fn test_greedy_wrap() {
        let style = TextStyle::new(10.0);
        // "aaa bbb" is exactly 70px
        let block = engine().layout("aaa bbb ccc", 70.0, &style);
        assert_eq!(texts(&block), ["aaa bbb", "ccc"]);
        assert_eq!(block.height(), 40.0);
        assert_eq!(block.lines()[1].top, 20.0);
        assert_eq!(block.lines()[1].baseline, 35.0);
    }

    #[test]
    fn test_long_word_gets_own_line() {
        let style = TextStyle::new(10.0);
        let block = engine().layout("a extraordinarily b", 50.0, &style);
        assert_eq!(texts(&block), ["a", "extraordinarily", "b"]);
        assert!(block.width() > 50.0);
    }

    #[test]
    fn test_hard_breaks_and_blank_lines() {
        let style = TextStyle::new(10.0);
        let block = engine().layout("English rock band\n\n9 albums\n120 tracks", 1000.0, &style);
        assert_eq!(texts(&block), ["English rock band", "", "9 albums", "120 tracks"]);
        assert_eq!(block.height(), 80.0);
    }

    #[test]
    fn test_empty_text() {
        let style = TextStyle::new(10.0);
        for text in ["", "   ", "\n\n"] {
            let block = engine().layout(text, 100.0, &style);
            assert!(block.is_empty());
            assert_eq!(block.height(), 0.0);
        }
    }

    #[test]
    fn test_degenerate_width() {
        let style = TextStyle::new(10.0);
        let block = engine().layout("one two", -20.0, &style);
        assert_eq!(texts(&block), ["one", "two"]);
        assert_eq!(block.max_width(), 0.0);

        let block = engine().layout("one two", f32::NAN, &style);
        assert_eq!(block.line_count(), 2);
    }

    #[test]
    fn test_line_spacing() {
        let style = TextStyle::new(10.0).with_line_spacing(1.5, 2.0);
        let block = engine().layout("a\nb", 100.0, &style);
        assert_eq!(block.line_height(), 32.0);
        assert_eq!(block.height(), 64.0);
    }

    #[test]
    fn test_layout_is_idempotent() {
        let engine = TextLayoutEngine::monospace();
        let style = TextStyle::new(17.0).with_bold(true);
        let text = "Radiohead are an English rock band formed in Abingdon, Oxfordshire, in 1985.";
        for width in [0.0, 93.5, 240.0, 1000.0] {
            assert_eq!(engine.layout(text, width, &style), engine.layout(text, width, &style));
        }
    }

    #[test]
    fn test_draw_emits_non_empty_lines() {
        let style = TextStyle::new(10.0);
        let block = engine().layout("a\n\nb", 100.0, &style);
        let mut canvas = RecordingCanvas::new(100.0, 100.0);
        block.draw(&mut canvas, 5.0, 10.0, &style, Color::BLACK);

        let baselines: Vec<f32> = canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { x, y, .. } => Some((*x, *y)),
                _ => None,
            })
            .map(|(x, y)| {
                assert_eq!(x, 5.0);
                y
            })
            .collect();
        assert_eq!(baselines, [25.0, 65.0]);
    }
}
