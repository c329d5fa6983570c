//! artcard - an artist card widget
//!
//! A card shows an artist's image in a fixed-height band, then the name
//! and a wrapped description, colored from a palette extracted out of the
//! image. The host drives it through `CardView`; images arrive from an
//! `ImageProvider` and palettes from a worker thread.

mod card;
mod config;
mod subject;
mod view;

pub use card::{CardError, CardLayoutModel};
pub use config::{
    CardConfig, CardDimensions, ConfigError, CountLabels, DefaultColors, FontConfig, PaletteConfig,
};
pub use subject::Subject;
pub use view::CardView;

pub use artcard_render as render;
pub use artcard_tasks as tasks;
