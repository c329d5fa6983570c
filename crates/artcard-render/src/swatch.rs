//! Color palette extraction
//!
//! Quantizes an image into a handful of weighted swatches (median cut over
//! 5-bit-per-channel colors), then picks named swatches by how close their
//! saturation and lightness come to each role's target.
//!
//! This module is synchronous; running it off the rendering thread is the
//! caller's job.

use crate::Color;
use crate::bitmap::LoadedImage;
use image::imageops::{self, FilterType};
use palette::{Hsl, IntoColor, Srgb};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Population of the single swatch in the default palette
const DEFAULT_POPULATION: u32 = 100;

const WEIGHT_SATURATION: f32 = 0.24;
const WEIGHT_LIGHTNESS: f32 = 0.52;
const WEIGHT_POPULATION: f32 = 0.24;

/// Pixels with less alpha than this are ignored
const MIN_ALPHA: u8 = 128;

const QUANTIZE_BITS: u32 = 5;
const HISTOGRAM_SIZE: usize = 1 << (QUANTIZE_BITS * 3);

/// Palette extraction errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("Image has no opaque pixels")]
    EmptyImage,

    #[error("No usable colors after filtering")]
    NoColors,
}

/// Quantizer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteSettings {
    /// Upper bound on the number of swatches
    pub max_colors: usize,
    /// Images larger than this many pixels are down-sampled first
    pub resize_area: u32,
}

impl Default for PaletteSettings {
    fn default() -> Self {
        Self {
            max_colors: 16,
            resize_area: 112 * 112,
        }
    }
}

/// A representative color and how many sampled pixels it stands for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swatch {
    color: Color,
    population: u32,
    hsl: [f32; 3],
}

impl Swatch {
    pub fn new(color: Color, population: u32) -> Self {
        Self {
            color,
            population,
            hsl: hsl_of(color),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    pub fn hsl(&self) -> [f32; 3] {
        self.hsl
    }
}

/// Named swatch slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwatchRole {
    LightVibrant,
    Vibrant,
    DarkVibrant,
    LightMuted,
    Muted,
    DarkMuted,
}

impl SwatchRole {
    /// Selection order; earlier roles get first pick of the swatches.
    pub const ALL: [SwatchRole; 6] = [
        SwatchRole::LightVibrant,
        SwatchRole::Vibrant,
        SwatchRole::DarkVibrant,
        SwatchRole::LightMuted,
        SwatchRole::Muted,
        SwatchRole::DarkMuted,
    ];

    fn index(self) -> usize {
        match self {
            Self::LightVibrant => 0,
            Self::Vibrant => 1,
            Self::DarkVibrant => 2,
            Self::LightMuted => 3,
            Self::Muted => 4,
            Self::DarkMuted => 5,
        }
    }

    /// (min, target, max) saturation and lightness.
    fn target(self) -> ([f32; 3], [f32; 3]) {
        const VIBRANT: [f32; 3] = [0.35, 1.0, 1.0];
        const MUTED: [f32; 3] = [0.0, 0.3, 0.4];
        const LIGHT: [f32; 3] = [0.55, 0.74, 1.0];
        const NORMAL: [f32; 3] = [0.3, 0.5, 0.7];
        const DARK: [f32; 3] = [0.0, 0.26, 0.45];

        match self {
            Self::LightVibrant => (VIBRANT, LIGHT),
            Self::Vibrant => (VIBRANT, NORMAL),
            Self::DarkVibrant => (VIBRANT, DARK),
            Self::LightMuted => (MUTED, LIGHT),
            Self::Muted => (MUTED, NORMAL),
            Self::DarkMuted => (MUTED, DARK),
        }
    }
}

impl fmt::Display for SwatchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LightVibrant => "light-vibrant",
            Self::Vibrant => "vibrant",
            Self::DarkVibrant => "dark-vibrant",
            Self::LightMuted => "light-muted",
            Self::Muted => "muted",
            Self::DarkMuted => "dark-muted",
        };
        f.write_str(name)
    }
}

/// The colors a card is painted with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScheme {
    pub background: Color,
    pub title: Color,
    pub body: Color,
    pub placeholder: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            background: Color::CARD_BG,
            title: Color::CARD_TEXT,
            body: Color::CARD_TEXT,
            placeholder: Color::WHITE,
        }
    }
}

/// A set of swatches with the named roles already selected
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    swatches: Vec<Swatch>,
    selected: [Option<usize>; 6],
    dominant: Option<usize>,
}

impl Palette {
    /// Build a palette from precomputed swatches.
    pub fn from_swatches(swatches: Vec<Swatch>) -> Self {
        let dominant = swatches
            .iter()
            .enumerate()
            .max_by_key(|(_, s)| s.population)
            .map(|(i, _)| i);
        let max_population = dominant.map_or(1, |i| swatches[i].population.max(1));

        let mut selected = [None; 6];
        let mut used = vec![false; swatches.len()];

        for role in SwatchRole::ALL {
            let (sat, light) = role.target();
            let mut best: Option<(usize, f32)> = None;

            for (i, swatch) in swatches.iter().enumerate() {
                let [_, s, l] = swatch.hsl;
                if used[i] || s < sat[0] || s > sat[2] || l < light[0] || l > light[2] {
                    continue;
                }
                let score = WEIGHT_SATURATION * (1.0 - (s - sat[1]).abs())
                    + WEIGHT_LIGHTNESS * (1.0 - (l - light[1]).abs())
                    + WEIGHT_POPULATION * (swatch.population as f32 / max_population as f32);
                if best.is_none_or(|(_, b)| score > b) {
                    best = Some((i, score));
                }
            }

            if let Some((i, _)) = best {
                used[i] = true;
                selected[role.index()] = Some(i);
            }
        }

        Self {
            swatches,
            selected,
            dominant,
        }
    }

    /// The always-available fallback: one white swatch.
    ///
    /// White qualifies for no vibrant or dark role, so every color the card
    /// asks for resolves to the caller's default.
    pub fn default_palette() -> Self {
        Self::from_swatches(vec![Swatch::new(Color::WHITE, DEFAULT_POPULATION)])
    }

    /// Quantize `image` and select the named swatches.
    pub fn generate(image: &LoadedImage, settings: &PaletteSettings) -> Result<Self, PaletteError> {
        let swatches = quantize(image, settings)?;
        debug!("Quantized {:?} into {} swatches", image.dimensions(), swatches.len());
        Ok(Self::from_swatches(swatches))
    }

    pub fn swatches(&self) -> &[Swatch] {
        &self.swatches
    }

    pub fn swatch(&self, role: SwatchRole) -> Option<&Swatch> {
        self.selected[role.index()].map(|i| &self.swatches[i])
    }

    pub fn dominant(&self) -> Option<&Swatch> {
        self.dominant.map(|i| &self.swatches[i])
    }

    /// Color for `role`, or `default` if no swatch qualified.
    pub fn color(&self, role: SwatchRole, default: Color) -> Color {
        self.swatch(role).map_or(default, Swatch::color)
    }

    /// Every slot of the scheme filled, from swatches where available.
    pub fn resolve(&self, defaults: &ColorScheme) -> ColorScheme {
        ColorScheme {
            background: self.color(SwatchRole::LightVibrant, defaults.background),
            title: self.color(SwatchRole::DarkMuted, defaults.title),
            body: self.color(SwatchRole::DarkMuted, defaults.body),
            placeholder: defaults.placeholder,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::default_palette()
    }
}

fn quantize(image: &LoadedImage, settings: &PaletteSettings) -> Result<Vec<Swatch>, PaletteError> {
    if image.is_empty() {
        return Err(PaletteError::EmptyImage);
    }

    let (width, height) = image.dimensions();
    let area = width as u64 * height as u64;
    let sampled;
    let pixels = if settings.resize_area > 0 && area > settings.resize_area as u64 {
        let scale = (settings.resize_area as f64 / area as f64).sqrt();
        let w = ((width as f64 * scale).ceil() as u32).max(1);
        let h = ((height as f64 * scale).ceil() as u32).max(1);
        sampled = imageops::resize(image.pixels(), w, h, FilterType::Triangle);
        &sampled
    } else {
        image.pixels()
    };

    let mut histogram = vec![0u32; HISTOGRAM_SIZE];
    let mut opaque = 0usize;
    for pixel in pixels.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < MIN_ALPHA {
            continue;
        }
        opaque += 1;
        histogram[pack(r, g, b) as usize] += 1;
    }

    if opaque == 0 {
        return Err(PaletteError::EmptyImage);
    }

    let mut colors: Vec<u16> = (0..HISTOGRAM_SIZE as u16)
        .filter(|&c| histogram[c as usize] > 0 && !is_rejected(c))
        .collect();

    if colors.is_empty() {
        return Err(PaletteError::NoColors);
    }

    let max_colors = settings.max_colors.max(1);
    if colors.len() <= max_colors {
        return Ok(colors
            .iter()
            .map(|&c| Swatch::new(expand(c), histogram[c as usize]))
            .collect());
    }

    let mut boxes = vec![ColorBox::new(0, colors.len(), &colors, &histogram)];
    while boxes.len() < max_colors {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.can_split())
            .max_by_key(|(_, b)| b.volume())
            .map(|(i, _)| i);

        let Some(index) = candidate else {
            break;
        };
        let second = boxes[index].split(&mut colors, &histogram);
        boxes.push(second);
    }

    Ok(boxes
        .iter()
        .map(|b| b.average(&colors, &histogram))
        .collect())
}

/// Near-black and near-white carry no character for a card
fn is_rejected(packed: u16) -> bool {
    let [_, _, l] = hsl_of(expand(packed));
    l <= 0.05 || l >= 0.95
}

/// Hue in degrees, saturation and lightness in `0.0..=1.0`
fn hsl_of(color: Color) -> [f32; 3] {
    let hsl: Hsl = Srgb::new(color.r, color.g, color.b).into_color();
    [
        hsl.hue.into_positive_degrees(),
        hsl.saturation.clamp(0.0, 1.0),
        hsl.lightness.clamp(0.0, 1.0),
    ]
}

fn pack(r: u8, g: u8, b: u8) -> u16 {
    let q = |v: u8| (v >> (8 - QUANTIZE_BITS)) as u16;
    (q(r) << (2 * QUANTIZE_BITS)) | (q(g) << QUANTIZE_BITS) | q(b)
}

fn unpack(packed: u16) -> [u8; 3] {
    let mask = (1u16 << QUANTIZE_BITS) - 1;
    [
        ((packed >> (2 * QUANTIZE_BITS)) & mask) as u8,
        ((packed >> QUANTIZE_BITS) & mask) as u8,
        (packed & mask) as u8,
    ]
}

fn widen(v: u8) -> u8 {
    (v << (8 - QUANTIZE_BITS)) | (v >> (2 * QUANTIZE_BITS - 8))
}

fn expand(packed: u16) -> Color {
    let [r, g, b] = unpack(packed);
    Color::from_rgba8([widen(r), widen(g), widen(b), 255])
}

/// A run `colors[lo..hi]` of quantized colors and its bounding box
struct ColorBox {
    lo: usize,
    hi: usize,
    min: [u8; 3],
    max: [u8; 3],
    population: u64,
}

impl ColorBox {
    fn new(lo: usize, hi: usize, colors: &[u16], histogram: &[u32]) -> Self {
        let mut cbox = Self {
            lo,
            hi,
            min: [u8::MAX; 3],
            max: [0; 3],
            population: 0,
        };
        cbox.fit(colors, histogram);
        cbox
    }

    fn fit(&mut self, colors: &[u16], histogram: &[u32]) {
        self.min = [u8::MAX; 3];
        self.max = [0; 3];
        self.population = 0;
        for &c in &colors[self.lo..self.hi] {
            let rgb = unpack(c);
            for ch in 0..3 {
                self.min[ch] = self.min[ch].min(rgb[ch]);
                self.max[ch] = self.max[ch].max(rgb[ch]);
            }
            self.population += histogram[c as usize] as u64;
        }
    }

    fn can_split(&self) -> bool {
        self.hi - self.lo > 1
    }

    fn volume(&self) -> u32 {
        (0..3)
            .map(|ch| (self.max[ch] - self.min[ch]) as u32 + 1)
            .product()
    }

    fn longest_channel(&self) -> usize {
        (0..3)
            .max_by_key(|&ch| (self.max[ch] - self.min[ch], 2 - ch))
            .unwrap_or(0)
    }

    /// Split at the population median along the longest channel. `self`
    /// keeps the lower half; the upper half is returned.
    fn split(&mut self, colors: &mut [u16], histogram: &[u32]) -> ColorBox {
        let channel = self.longest_channel();
        colors[self.lo..self.hi].sort_by_key(|&c| {
            let rgb = unpack(c);
            (rgb[channel], rgb[(channel + 1) % 3], rgb[(channel + 2) % 3])
        });

        let midpoint = self.population / 2;
        let mut count = 0u64;
        let mut split = self.hi - 2;
        for i in self.lo..self.hi {
            count += histogram[colors[i] as usize] as u64;
            if count >= midpoint {
                split = i.min(self.hi - 2);
                break;
            }
        }

        let upper = ColorBox::new(split + 1, self.hi, colors, histogram);
        self.hi = split + 1;
        self.fit(colors, histogram);
        upper
    }

    fn average(&self, colors: &[u16], histogram: &[u32]) -> Swatch {
        let mut sum = [0u64; 3];
        for &c in &colors[self.lo..self.hi] {
            let weight = histogram[c as usize] as u64;
            let rgb = unpack(c);
            for ch in 0..3 {
                sum[ch] += widen(rgb[ch]) as u64 * weight;
            }
        }
        let population = self.population.max(1);
        let avg = |ch: usize| (sum[ch] as f64 / population as f64).round() as u8;
        Swatch::new(
            Color::from_rgba8([avg(0), avg(1), avg(2), 255]),
            self.population.min(u32::MAX as u64) as u32,
        )
    }
}
