//! artcard render - pixels, colors and text for the artist card
//!
//! Everything here is synchronous and free of shared state: scaling a
//! bitmap into the image band, quantizing a palette out of it, wrapping
//! text, and drawing through the `Canvas` abstraction.

mod bitmap;
mod canvas;
mod color;
mod raster;
mod scaler;
mod swatch;
mod text;

pub use bitmap::{LoadedImage, ScaledImage};
pub use canvas::{Canvas, DrawCommand, RecordingCanvas, Rect};
pub use color::Color;
pub use fontdue::Font;
pub use raster::PixelCanvas;
pub use scaler::{FitPolicy, fit, fit_with};
pub use swatch::{ColorScheme, Palette, PaletteError, PaletteSettings, Swatch, SwatchRole};
pub use text::{
    FontMetrics, FontdueMetrics, LineMetrics, MonospaceMetrics, TextBlock, TextError,
    TextLayoutEngine, TextLine, TextStyle,
};
