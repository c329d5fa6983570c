//! Card Configuration
//!
//! Fixed dimensions, fonts, default colors and labels. Read once when the
//! card is built and never changed afterwards.

use artcard_render::{Color, ColorScheme, PaletteSettings, TextStyle};
use serde::Deserialize;
use serde::de::{self, Deserializer};
use std::path::{Path, PathBuf};

/// Upper bound for any single dimension, in pixels
const MAX_LENGTH: f32 = 4096.0;
const MAX_FONT_SIZE: f32 = 512.0;
const MAX_LINE_SPACING_MULT: f32 = 10.0;
const MAX_COLORS: usize = 256;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Fixed card geometry in pixels
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CardDimensions {
    /// Height of the image band
    pub image_band_height: f32,
    pub top_padding: f32,
    pub bottom_padding: f32,
    /// Left/right inset of the image band
    pub poster_padding: f32,
    /// Left/right inset of the text
    pub text_padding: f32,
    /// Gap between the band and the title
    pub poster_text_margin: f32,
    /// Gap between the title and the description
    pub title_desc_margin: f32,
}

impl Default for CardDimensions {
    fn default() -> Self {
        Self {
            image_band_height: 400.0,
            top_padding: 16.0,
            bottom_padding: 16.0,
            poster_padding: 0.0,
            text_padding: 16.0,
            poster_text_margin: 12.0,
            title_desc_margin: 8.0,
        }
    }
}

impl CardDimensions {
    /// Everything the height adds up besides the band and the text.
    pub fn fixed_spacing(&self) -> f32 {
        self.top_padding + self.bottom_padding + self.poster_text_margin + self.title_desc_margin
    }
}

/// Font sizes and spacing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub title_size: f32,
    pub title_bold: bool,
    pub body_size: f32,
    pub line_spacing_mult: f32,
    pub line_spacing_add: f32,
    /// TrueType/OpenType file; fixed-advance metrics are used without one
    pub font_path: Option<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            title_size: 24.0,
            title_bold: true,
            body_size: 16.0,
            line_spacing_mult: 1.0,
            line_spacing_add: 0.0,
            font_path: None,
        }
    }
}

/// Colors used whenever the palette has no matching swatch
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultColors {
    #[serde(deserialize_with = "color_from_str")]
    pub text: Color,
    #[serde(deserialize_with = "color_from_str")]
    pub background: Color,
    #[serde(deserialize_with = "color_from_str")]
    pub placeholder: Color,
}

impl Default for DefaultColors {
    fn default() -> Self {
        Self {
            text: Color::from_hex(0x212121),
            background: Color::from_hex(0xFAFAFA),
            placeholder: Color::WHITE,
        }
    }
}

/// Singular/plural templates for the count lines; `{count}` is replaced
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CountLabels {
    pub show_counts: bool,
    pub album_one: String,
    pub album_other: String,
    pub track_one: String,
    pub track_other: String,
}

impl Default for CountLabels {
    fn default() -> Self {
        Self {
            show_counts: true,
            album_one: "{count} album".to_string(),
            album_other: "{count} albums".to_string(),
            track_one: "{count} track".to_string(),
            track_other: "{count} tracks".to_string(),
        }
    }
}

impl CountLabels {
    pub fn albums(&self, count: u32) -> String {
        plural(count, &self.album_one, &self.album_other)
    }

    pub fn tracks(&self, count: u32) -> String {
        plural(count, &self.track_one, &self.track_other)
    }
}

fn plural(count: u32, one: &str, other: &str) -> String {
    let template = if count == 1 { one } else { other };
    template.replace("{count}", &count.to_string())
}

/// Quantizer knobs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub max_colors: usize,
    pub resize_area: u32,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        let settings = PaletteSettings::default();
        Self {
            max_colors: settings.max_colors,
            resize_area: settings.resize_area,
        }
    }
}

/// Complete card configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    pub dimensions: CardDimensions,
    pub fonts: FontConfig,
    pub colors: DefaultColors,
    pub labels: CountLabels,
    pub palette: PaletteConfig,
}

impl CardConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.dimensions;
        let lengths = [
            ("image_band_height", d.image_band_height),
            ("top_padding", d.top_padding),
            ("bottom_padding", d.bottom_padding),
            ("poster_padding", d.poster_padding),
            ("text_padding", d.text_padding),
            ("poster_text_margin", d.poster_text_margin),
            ("title_desc_margin", d.title_desc_margin),
        ];
        let out_of_range = |v: f32| !(0.0..=MAX_LENGTH).contains(&v);
        if let Some((name, value)) = lengths.iter().find(|(_, v)| out_of_range(*v)) {
            return Err(ConfigError::Invalid(format!(
                "{} must be in 0..={} (got {})",
                name, MAX_LENGTH, value
            )));
        }

        let f = &self.fonts;
        let bad_size = |v: f32| !(v > 0.0 && v <= MAX_FONT_SIZE);
        if bad_size(f.title_size) || bad_size(f.body_size) {
            return Err(ConfigError::Invalid(format!(
                "font sizes must be in (0, {}]",
                MAX_FONT_SIZE
            )));
        }
        let mult_ok = f.line_spacing_mult > 0.0 && f.line_spacing_mult <= MAX_LINE_SPACING_MULT;
        let add_ok = f.line_spacing_add.abs() <= MAX_LENGTH;
        if !mult_ok || !add_ok {
            return Err(ConfigError::Invalid("invalid line spacing".to_string()));
        }

        if !(2..=MAX_COLORS).contains(&self.palette.max_colors) {
            return Err(ConfigError::Invalid(format!(
                "palette.max_colors must be in 2..={}",
                MAX_COLORS
            )));
        }
        Ok(())
    }

    pub fn title_style(&self) -> TextStyle {
        TextStyle::new(self.fonts.title_size)
            .with_color(self.colors.text)
            .with_bold(self.fonts.title_bold)
            .with_line_spacing(self.fonts.line_spacing_mult, self.fonts.line_spacing_add)
    }

    pub fn body_style(&self) -> TextStyle {
        TextStyle::new(self.fonts.body_size)
            .with_color(self.colors.text)
            .with_line_spacing(self.fonts.line_spacing_mult, self.fonts.line_spacing_add)
    }

    /// Colors drawn when no image palette is available.
    pub fn color_scheme(&self) -> ColorScheme {
        ColorScheme {
            background: self.colors.background,
            title: self.colors.text,
            body: self.colors.text,
            placeholder: self.colors.placeholder,
        }
    }

    pub fn palette_settings(&self) -> PaletteSettings {
        PaletteSettings {
            max_colors: self.palette.max_colors,
            resize_area: self.palette.resize_area,
        }
    }
}

fn color_from_str<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    Color::parse(&text).ok_or_else(|| de::Error::custom(format!("invalid color '{}'", text)))
}
