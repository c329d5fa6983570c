//! Palette extraction off the rendering thread.

use crate::mailbox::Mailbox;
use crate::message::{CardMessage, Generation};
use artcard_render::{LoadedImage, Palette, PaletteSettings};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Extraction start-up errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to spawn palette worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Runs `Palette::generate` on a worker thread and posts the result
#[derive(Debug, Clone)]
pub struct PaletteExtractor {
    mailbox: Mailbox,
    settings: PaletteSettings,
}

impl PaletteExtractor {
    pub fn new(mailbox: Mailbox, settings: PaletteSettings) -> Self {
        Self { mailbox, settings }
    }

    /// The synchronous fallback palette.
    pub fn default_palette() -> Palette {
        Palette::default_palette()
    }

    /// Start extraction for `image`, tagged with `generation`.
    ///
    /// Returns once the worker is running. The worker runs inside a panic
    /// boundary and always posts exactly one `PaletteReady` or
    /// `PaletteFailed`.
    pub fn extract_async(
        &self,
        generation: Generation,
        image: &LoadedImage,
    ) -> Result<(), ExtractError> {
        let image = image.clone();
        let mailbox = self.mailbox.clone();
        let settings = self.settings;

        thread::Builder::new()
            .name(format!("palette-{}", generation.0))
            .spawn(move || {
                let start = Instant::now();
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    Palette::generate(&image, &settings)
                }));

                let msg = match result {
                    Ok(Ok(palette)) => {
                        debug!(
                            "Palette {} ready: {} swatches in {:?}",
                            generation,
                            palette.swatches().len(),
                            start.elapsed()
                        );
                        CardMessage::PaletteReady { generation, palette }
                    }
                    Ok(Err(e)) => {
                        warn!("Palette {} failed: {}", generation, e);
                        CardMessage::PaletteFailed {
                            generation,
                            error: e.to_string(),
                        }
                    }
                    Err(panic_info) => {
                        let error_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic_info.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "Unknown panic".to_string()
                        };
                        error!("Palette {} panicked: {}", generation, error_msg);
                        CardMessage::PaletteFailed {
                            generation,
                            error: error_msg,
                        }
                    }
                };

                mailbox.post(msg);
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    #[test]
    fn test_extract_posts_palette() {
        let (mailbox, rx) = Mailbox::channel();
        let extractor = PaletteExtractor::new(mailbox, PaletteSettings::default());
        let image = LoadedImage::new(RgbaImage::from_pixel(32, 32, Rgba([220, 30, 30, 255])));

        extractor.extract_async(Generation(4), &image).unwrap();

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            CardMessage::PaletteReady { generation, palette } => {
                assert_eq!(generation, Generation(4));
                assert_eq!(palette.swatches().len(), 1);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extract_reports_failure() {
        let (mailbox, rx) = Mailbox::channel();
        let extractor = PaletteExtractor::new(mailbox, PaletteSettings::default());
        let image = LoadedImage::new(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));

        extractor.extract_async(Generation(1), &image).unwrap();

        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(msg, CardMessage::PaletteFailed { generation: Generation(1), .. }));
    }

    #[test]
    fn test_default_palette_is_complete() {
        let palette = PaletteExtractor::default_palette();
        assert_eq!(palette.swatches().len(), 1);
        assert!(palette.dominant().is_some());
    }
}
