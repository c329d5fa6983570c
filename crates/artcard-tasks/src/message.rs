//! Message types carried from background work to the rendering thread.

use crate::provider::LoadError;
use artcard_render::{LoadedImage, Palette};
use std::fmt;

/// Identifies one image request; strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request({})", self.0)
    }
}

/// Identifies one delivered image; palette results carry it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen({})", self.0)
    }
}

/// Results posted to the card's mailbox.
///
/// Each carries the token or generation it was started under so the
/// receiver can drop anything that has been superseded.
#[derive(Debug, Clone)]
pub enum CardMessage {
    /// Image request finished with pixels
    ImageLoaded {
        token: RequestToken,
        image: LoadedImage,
    },
    /// Image request failed
    ImageFailed {
        token: RequestToken,
        error: LoadError,
    },
    /// Palette computed for an image
    PaletteReady {
        generation: Generation,
        palette: Palette,
    },
    /// Palette extraction failed or panicked
    PaletteFailed {
        generation: Generation,
        error: String,
    },
}

impl CardMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ImageLoaded { .. } => "image-loaded",
            Self::ImageFailed { .. } => "image-failed",
            Self::PaletteReady { .. } => "palette-ready",
            Self::PaletteFailed { .. } => "palette-failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display() {
        assert_eq!(RequestToken(7).to_string(), "Request(7)");
        assert_eq!(Generation(3).to_string(), "Gen(3)");
        assert_eq!(Generation::default().next(), Generation(1));
    }
}
