//! Color utilities

use std::fmt;

/// RGBA color, each channel in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    // Card defaults (light theme)
    pub const CARD_BG: Color = Color::rgb(0.98, 0.98, 0.98);
    pub const CARD_TEXT: Color = Color::rgb(0.13, 0.13, 0.13);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// `0xRRGGBB`, fully opaque
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Self::rgb(r, g, b)
    }

    /// `0xAARRGGBB`
    pub fn from_argb(argb: u32) -> Self {
        let a = ((argb >> 24) & 0xFF) as f32 / 255.0;
        Self {
            a,
            ..Self::from_hex(argb)
        }
    }

    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self::rgba(
            rgba[0] as f32 / 255.0,
            rgba[1] as f32 / 255.0,
            rgba[2] as f32 / 255.0,
            rgba[3] as f32 / 255.0,
        )
    }

    /// Parse `#RRGGBB` or `#AARRGGBB` (leading `#` optional).
    pub fn parse(text: &str) -> Option<Self> {
        let digits = text.trim().trim_start_matches('#');
        let value = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            6 => Some(Self::from_hex(value)),
            8 => Some(Self::from_argb(value)),
            _ => None,
        }
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn to_argb(&self) -> u32 {
        let [r, g, b, a] = self.to_rgba8();
        u32::from_be_bytes([a, r, g, b])
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.to_argb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Color::parse("#FFFFFF"), Some(Color::WHITE));
        assert_eq!(Color::parse("00000000"), Some(Color::TRANSPARENT));
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("#GGGGGG"), None);
    }

    #[test]
    fn test_argb_roundtrip() {
        let color = Color::from_argb(0x80FF4020);
        assert_eq!(color.to_argb(), 0x80FF4020);
        assert_eq!(color.to_string(), "#80FF4020");
    }
}
