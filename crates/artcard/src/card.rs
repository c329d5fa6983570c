//! Card Layout Model
//!
//! Owns everything one card displays: the subject, its image, the palette
//! and the measured text. All methods run on the host's rendering thread;
//! image loads and palette extraction report back through the mailbox and
//! are applied in `process_messages`.

use crate::config::{CardConfig, ConfigError};
use crate::subject::Subject;
use crate::view::CardView;
use artcard_render::{
    fit, Canvas, ColorScheme, Font, FontdueMetrics, LoadedImage, Palette, Rect, ScaledImage,
    TextBlock, TextError, TextLayoutEngine, TextStyle,
};
use artcard_tasks::{
    CardMessage, Generation, ImageLoadController, ImageProvider, LoadState, Mailbox,
    PaletteExtractor, RedrawHook,
};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Card construction errors
#[derive(Debug, Error)]
pub enum CardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Font(#[from] TextError),
}

/// Text laid out by the last measure pass
#[derive(Debug, Clone)]
struct MeasuredLayout {
    width: f32,
    height: f32,
    title: TextBlock,
    description: TextBlock,
}

/// Band size in whole pixels, the key of the scaled-image cache
type BandSize = (i32, i32);

/// The artist card
pub struct CardLayoutModel {
    config: CardConfig,
    engine: TextLayoutEngine,
    font: Option<Arc<Font>>,
    title_style: TextStyle,
    body_style: TextStyle,
    defaults: ColorScheme,

    subject: Option<Subject>,
    image: Option<LoadedImage>,
    generation: Generation,
    scaled: Option<(BandSize, ScaledImage)>,
    default_palette: Palette,
    image_palette: Option<Palette>,
    palette_requested: bool,
    palette_pending: bool,
    layout: Option<MeasuredLayout>,

    loader: ImageLoadController,
    extractor: PaletteExtractor,
    inbox: Receiver<CardMessage>,
}

impl CardLayoutModel {
    /// Build a card. `redraw` is called from worker threads whenever a
    /// message is queued; the host should respond by calling
    /// `process_messages` on its rendering thread.
    pub fn new(
        config: CardConfig,
        provider: Arc<dyn ImageProvider>,
        redraw: Option<RedrawHook>,
    ) -> Result<Self, CardError> {
        config.validate()?;

        let (engine, font) = match &config.fonts.font_path {
            Some(path) => {
                let metrics = FontdueMetrics::from_file(path)?;
                info!("Loaded card font {}", path.display());
                let font = metrics.font();
                (TextLayoutEngine::new(Arc::new(metrics)), Some(font))
            }
            None => (TextLayoutEngine::monospace(), None),
        };

        let (mailbox, inbox) = Mailbox::channel();
        let mailbox = match redraw {
            Some(hook) => mailbox.with_redraw_hook(hook),
            None => mailbox,
        };

        Ok(Self {
            title_style: config.title_style(),
            body_style: config.body_style(),
            defaults: config.color_scheme(),
            loader: ImageLoadController::new(provider, mailbox.clone()),
            extractor: PaletteExtractor::new(mailbox, config.palette_settings()),
            default_palette: PaletteExtractor::default_palette(),
            config,
            engine,
            font,
            subject: None,
            image: None,
            generation: Generation::default(),
            scaled: None,
            image_palette: None,
            palette_requested: false,
            palette_pending: false,
            layout: None,
            inbox,
        })
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    pub fn engine(&self) -> &TextLayoutEngine {
        &self.engine
    }

    /// Font for pixel canvases, when one is configured.
    pub fn font(&self) -> Option<Arc<Font>> {
        self.font.clone()
    }

    pub fn title_style(&self) -> &TextStyle {
        &self.title_style
    }

    pub fn body_style(&self) -> &TextStyle {
        &self.body_style
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.loader.state()
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    /// The image as last scaled for the band.
    pub fn scaled_image(&self) -> Option<&ScaledImage> {
        self.scaled.as_ref().map(|(_, scaled)| scaled)
    }

    pub fn image_palette(&self) -> Option<&Palette> {
        self.image_palette.as_ref()
    }

    /// The image palette once ready, the default palette until then.
    pub fn active_palette(&self) -> &Palette {
        self.image_palette.as_ref().unwrap_or(&self.default_palette)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn title_block(&self) -> Option<&TextBlock> {
        self.layout.as_ref().map(|l| &l.title)
    }

    pub fn description_block(&self) -> Option<&TextBlock> {
        self.layout.as_ref().map(|l| &l.description)
    }

    /// Height from the last measure pass.
    pub fn measured_height(&self) -> Option<f32> {
        self.layout.as_ref().map(|l| l.height)
    }

    /// Whether an image load or a palette extraction is still outstanding.
    pub fn has_pending_work(&self) -> bool {
        self.loader.is_loading() || self.palette_pending
    }

    /// Drop the subject and everything derived from it.
    pub fn clear_subject(&mut self) {
        self.reset();
        self.subject = None;
        self.loader.set_subject(None);
    }

    fn reset(&mut self) {
        self.image = None;
        self.scaled = None;
        self.image_palette = None;
        self.palette_requested = false;
        self.palette_pending = false;
        self.layout = None;
        // Anything still computing for the old image is now stale
        self.generation = self.generation.next();
    }

    fn band_rect(&self, width: f32) -> Rect {
        let d = &self.config.dimensions;
        Rect::new(
            d.poster_padding,
            d.top_padding,
            (width - 2.0 * d.poster_padding).max(0.0),
            d.image_band_height,
        )
    }

    /// Scale the image for `band`, reusing the cached result when the band
    /// size is unchanged.
    fn ensure_scaled(&mut self, band: Rect) {
        let Some(image) = &self.image else {
            return;
        };
        let size = (band.width.round() as i32, band.height.round() as i32);
        if self.scaled.as_ref().is_some_and(|(cached, _)| *cached == size) {
            return;
        }
        let scaled = fit(image, size.0, size.1);
        debug!(
            "Scaled {:?} to {:?} for band {:?}",
            image.dimensions(),
            scaled.dimensions(),
            size
        );
        self.scaled = Some((size, scaled));
    }

    /// Start palette extraction once per image.
    fn ensure_palette_requested(&mut self) {
        let Some(image) = &self.image else {
            return;
        };
        if self.palette_requested {
            return;
        }
        self.palette_requested = true;
        match self.extractor.extract_async(self.generation, image) {
            Ok(()) => self.palette_pending = true,
            Err(e) => warn!("{}; keeping default palette", e),
        }
    }

    fn apply(&mut self, msg: CardMessage) -> bool {
        match msg {
            CardMessage::ImageLoaded { token, image } => {
                if !self.loader.accept(token, true) {
                    return false;
                }
                debug!("{} delivered {:?} image", token, image.dimensions());
                self.generation = self.generation.next();
                self.image = Some(image);
                self.scaled = None;
                self.image_palette = None;
                self.palette_requested = false;
                self.palette_pending = false;
                true
            }
            CardMessage::ImageFailed { token, error } => {
                if !self.loader.accept(token, false) {
                    return false;
                }
                warn!("{} failed: {}", token, error);
                self.image = None;
                self.scaled = None;
                self.image_palette = None;
                self.palette_requested = false;
                self.palette_pending = false;
                true
            }
            CardMessage::PaletteReady { generation, palette } => {
                if generation != self.generation || self.image.is_none() {
                    debug!("Discarding stale palette {}", generation);
                    return false;
                }
                self.image_palette = Some(palette);
                self.palette_pending = false;
                true
            }
            CardMessage::PaletteFailed { generation, error } => {
                if generation == self.generation {
                    debug!("Palette {} unavailable ({}), keeping default", generation, error);
                    self.palette_pending = false;
                }
                false
            }
        }
    }
}

impl CardView for CardLayoutModel {
    fn measure(&mut self, available_width: f32) -> f32 {
        let width = if available_width.is_finite() {
            available_width.max(0.0)
        } else {
            0.0
        };

        let Some(subject) = &self.subject else {
            self.layout = None;
            return 0.0;
        };

        let d = &self.config.dimensions;
        let text_width = (width - 2.0 * d.text_padding).max(0.0);
        let title = self
            .engine
            .layout(subject.title_text(), text_width, &self.title_style);
        let description = self.engine.layout(
            &subject.description_text(&self.config.labels),
            text_width,
            &self.body_style,
        );

        let height =
            d.image_band_height + title.height() + description.height() + d.fixed_spacing();

        debug!(
            "Measured card {} at width {}: {} + {} lines, height {}",
            subject.id,
            width,
            title.line_count(),
            description.line_count(),
            height
        );

        self.layout = Some(MeasuredLayout {
            width,
            height,
            title,
            description,
        });
        height
    }

    fn draw(&mut self, canvas: &mut dyn Canvas) {
        if self.subject.is_none() {
            return;
        }

        let width = canvas.width();
        if self.layout.as_ref().is_none_or(|l| l.width != width) {
            debug!("Drawing at width {} without a matching measure pass", width);
            self.measure(width);
        }

        self.ensure_palette_requested();
        let band = self.band_rect(width);
        self.ensure_scaled(band);

        let Some(layout) = &self.layout else {
            return;
        };
        let colors = self.active_palette().resolve(&self.defaults);

        canvas.fill_rect(Rect::new(0.0, 0.0, width, canvas.height()), colors.background);

        match self.scaled_image() {
            Some(scaled) if !scaled.is_empty() => canvas.draw_image(band.x, band.y, scaled),
            _ => canvas.fill_rect(band, colors.placeholder),
        }

        let d = &self.config.dimensions;
        let title_y = band.bottom() + d.poster_text_margin;
        layout
            .title
            .draw(canvas, d.text_padding, title_y, &self.title_style, colors.title);

        let description_y = title_y + layout.title.height() + d.title_desc_margin;
        layout.description.draw(
            canvas,
            d.text_padding,
            description_y,
            &self.body_style,
            colors.body,
        );
    }

    fn on_subject_changed(&mut self, subject: Subject) {
        info!("Card showing {} ({})", subject.name, subject.id);
        self.reset();
        self.loader.set_subject(subject.image_uri());
        self.subject = Some(subject);
    }

    fn process_messages(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.inbox.try_recv() {
            changed |= self.apply(msg);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artcard_render::{Color, DrawCommand, RecordingCanvas, SwatchRole};
    use artcard_tasks::{DeferredImageProvider, LoadError};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn card() -> (CardLayoutModel, Arc<DeferredImageProvider>) {
        let provider = Arc::new(DeferredImageProvider::new());
        let card = CardLayoutModel::new(CardConfig::default(), provider.clone(), None).unwrap();
        (card, provider)
    }

    fn radiohead() -> Subject {
        Subject::new(1, "Radiohead")
            .with_description("English rock band")
            .with_counts(9, 120)
            .with_image("radiohead.png")
    }

    fn solid(width: u32, height: u32) -> LoadedImage {
        LoadedImage::new(RgbaImage::from_pixel(width, height, Rgba([40, 90, 200, 255])))
    }

    fn two_tone() -> LoadedImage {
        LoadedImage::new(RgbaImage::from_fn(64, 64, |_, y| {
            if y < 32 {
                Rgba([255, 150, 150, 255])
            } else {
                Rgba([60, 50, 50, 255])
            }
        }))
    }

    fn draw(card: &mut CardLayoutModel, width: f32) -> Vec<DrawCommand> {
        let mut canvas = RecordingCanvas::new(width, 1000.0);
        card.draw(&mut canvas);
        canvas.take_commands()
    }

    fn images(commands: &[DrawCommand]) -> Vec<(f32, f32, f32, f32)> {
        commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Image { x, y, width, height } => Some((*x, *y, *width, *height)),
                _ => None,
            })
            .collect()
    }

    fn texts(commands: &[DrawCommand]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn wait_for(card: &mut CardLayoutModel, done: impl Fn(&CardLayoutModel) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(&*card) {
            assert!(Instant::now() < deadline, "timed out waiting for card messages");
            card.process_messages();
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_no_subject_draws_nothing() {
        let (mut card, provider) = card();
        assert_eq!(card.measure(1000.0), 0.0);
        assert!(draw(&mut card, 1000.0).is_empty());
        assert!(provider.requested().is_empty());
    }

    #[test]
    fn test_measure_radiohead() {
        let (mut card, provider) = card();
        card.on_subject_changed(radiohead());
        assert_eq!(provider.requested(), ["radiohead.png"]);

        let height = card.measure(1000.0);

        let title = card.title_block().unwrap();
        let description = card.description_block().unwrap();
        assert_eq!(title.line_count(), 1);
        assert_eq!(description.line_count(), 4);
        assert_eq!(title.max_width(), 968.0);

        let expected = 400.0 + title.height() + description.height() + 16.0 + 16.0 + 12.0 + 8.0;
        assert!((height - expected).abs() < 1e-3);
        assert_eq!(card.measured_height(), Some(height));
    }

    #[test]
    fn test_draw_placeholder_while_loading() {
        let (mut card, _provider) = card();
        card.on_subject_changed(radiohead());
        card.measure(1000.0);

        let commands = draw(&mut card, 1000.0);
        let defaults = card.config().color_scheme();

        assert_eq!(
            commands[0],
            DrawCommand::Rect {
                x: 0.0,
                y: 0.0,
                width: 1000.0,
                height: 1000.0,
                color: defaults.background,
            }
        );
        assert_eq!(
            commands[1],
            DrawCommand::Rect {
                x: 0.0,
                y: 16.0,
                width: 1000.0,
                height: 400.0,
                color: defaults.placeholder,
            }
        );
        assert!(images(&commands).is_empty());
        assert_eq!(
            texts(&commands),
            ["Radiohead", "English rock band", "9 albums", "120 tracks"]
        );

        // Title sits below the band, description below the title
        match &commands[2] {
            DrawCommand::Text { x, y, bold, color, .. } => {
                assert_eq!(*x, 16.0);
                assert!(*y > 16.0 + 400.0 + 12.0);
                assert!(*bold);
                assert_eq!(*color, defaults.title);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_loaded_image_is_scaled_into_band() {
        let (mut card, provider) = card();
        card.on_subject_changed(radiohead());
        card.measure(1000.0);

        assert!(provider.complete("radiohead.png", Ok(solid(2000, 1000))));
        assert!(card.process_messages());
        assert!(matches!(card.load_state(), LoadState::Loaded(_)));

        let commands = draw(&mut card, 1000.0);
        assert_eq!(images(&commands), [(0.0, 16.0, 1000.0, 400.0)]);
        assert_eq!(card.scaled_image().unwrap().dimensions(), (1000, 400));
    }

    #[test]
    fn test_rapid_subject_change_discards_stale_image() {
        let (mut card, provider) = card();
        card.on_subject_changed(Subject::new(1, "A").with_image("a.png"));
        card.on_subject_changed(Subject::new(2, "B").with_image("b.png"));
        assert_eq!(provider.is_cancelled("a.png"), Some(true));

        let b = solid(300, 300);
        provider.complete("a.png", Ok(solid(200, 100)));
        assert!(!card.process_messages());
        assert!(card.image().is_none());
        assert!(images(&draw(&mut card, 500.0)).is_empty());

        provider.complete("b.png", Ok(b.clone()));
        assert!(card.process_messages());
        assert!(card.image().unwrap().same_pixels(&b));
        assert_eq!(card.subject().unwrap().name, "B");
        assert_eq!(images(&draw(&mut card, 500.0)).len(), 1);
    }

    #[test]
    fn test_subject_without_image() {
        let (mut card, provider) = card();
        card.on_subject_changed(Subject::new(3, "Nobody").with_description("No picture"));

        assert!(provider.requested().is_empty());
        assert_eq!(card.load_state(), LoadState::Idle);

        let commands = draw(&mut card, 600.0);
        assert!(images(&commands).is_empty());
        assert!(matches!(
            commands[1],
            DrawCommand::Rect { y, height, color, .. }
                if y == 16.0 && height == 400.0 && color == card.config().colors.placeholder
        ));
    }

    #[test]
    fn test_empty_text() {
        let provider = Arc::new(DeferredImageProvider::new());
        let mut config = CardConfig::default();
        config.labels.show_counts = false;
        let mut card = CardLayoutModel::new(config, provider, None).unwrap();

        card.on_subject_changed(Subject::new(4, ""));
        let height = card.measure(800.0);

        assert!(card.title_block().unwrap().is_empty());
        assert!(card.description_block().unwrap().is_empty());
        assert_eq!(height, 400.0 + 52.0);
        assert!(texts(&draw(&mut card, 800.0)).is_empty());
    }

    #[test]
    fn test_failed_load_keeps_placeholder_and_default_palette() {
        let (mut card, provider) = card();
        card.on_subject_changed(radiohead());
        provider.complete("radiohead.png", Err(LoadError::Io("offline".to_string())));

        assert!(card.process_messages());
        assert!(matches!(card.load_state(), LoadState::Failed(_)));
        assert!(card.image().is_none());

        let commands = draw(&mut card, 1000.0);
        assert!(images(&commands).is_empty());
        assert_eq!(*card.active_palette(), Palette::default_palette());
        assert!(card.image_palette().is_none());
    }

    #[test]
    fn test_palette_extracted_after_first_draw() {
        let (mut card, provider) = card();
        card.on_subject_changed(radiohead());
        provider.complete("radiohead.png", Ok(two_tone()));
        card.process_messages();
        assert!(card.image_palette().is_none());

        // The first frame uses the default palette and starts extraction
        let first = draw(&mut card, 1000.0);
        let defaults = card.config().color_scheme();
        assert!(matches!(
            first[0],
            DrawCommand::Rect { color, .. } if color == defaults.background
        ));

        assert!(card.has_pending_work());
        wait_for(&mut card, |c| c.image_palette().is_some());
        assert!(!card.has_pending_work());

        let background = card
            .image_palette()
            .unwrap()
            .color(SwatchRole::LightVibrant, Color::TRANSPARENT);
        assert_ne!(background, Color::TRANSPARENT);

        let second = draw(&mut card, 1000.0);
        assert!(matches!(second[0], DrawCommand::Rect { color, .. } if color == background));
    }

    #[test]
    fn test_stale_palette_discarded_after_subject_change() {
        let (mut card, provider) = card();
        card.on_subject_changed(radiohead());
        provider.complete("radiohead.png", Ok(two_tone()));
        card.process_messages();
        let stale = card.generation();
        card.on_subject_changed(Subject::new(5, "Next"));

        // Deliver a palette for the superseded image directly
        let msg = CardMessage::PaletteReady {
            generation: stale,
            palette: Palette::default_palette(),
        };
        assert!(!card.apply(msg));
        assert!(card.image_palette().is_none());
        assert_ne!(card.generation(), stale);
    }

    #[test]
    fn test_draw_width_mismatch_remeasures() {
        let (mut card, _provider) = card();
        card.on_subject_changed(radiohead());
        card.measure(1000.0);

        draw(&mut card, 600.0);
        assert_eq!(card.title_block().unwrap().max_width(), 568.0);
    }

    #[test]
    fn test_redraw_hook_fires_on_completion() {
        let provider = Arc::new(DeferredImageProvider::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hook: RedrawHook = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut card =
            CardLayoutModel::new(CardConfig::default(), provider.clone(), Some(hook)).unwrap();

        card.on_subject_changed(radiohead());
        provider.complete("radiohead.png", Ok(solid(10, 10)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(card.process_messages());
    }

    fn counting_card() -> (CardLayoutModel, Arc<DeferredImageProvider>, Arc<AtomicUsize>) {
        let provider = Arc::new(DeferredImageProvider::new());
        let posts = Arc::new(AtomicUsize::new(0));
        let counter = posts.clone();
        let hook: RedrawHook = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let card =
            CardLayoutModel::new(CardConfig::default(), provider.clone(), Some(hook)).unwrap();
        (card, provider, posts)
    }

    fn wait_for_posts(posts: &AtomicUsize, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while posts.load(Ordering::SeqCst) < count {
            assert!(Instant::now() < deadline, "timed out waiting for {} posts", count);
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_palette_extracted_once_per_image() {
        let (mut card, provider, posts) = counting_card();
        card.on_subject_changed(radiohead());
        provider.complete("radiohead.png", Ok(two_tone()));
        assert!(card.process_messages());
        assert_eq!(posts.load(Ordering::SeqCst), 1);

        // Nothing is extracted until the image is drawn
        thread::sleep(Duration::from_millis(50));
        assert_eq!(posts.load(Ordering::SeqCst), 1);
        assert!(!card.has_pending_work());

        for _ in 0..3 {
            draw(&mut card, 1000.0);
        }
        wait_for_posts(&posts, 2);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(posts.load(Ordering::SeqCst), 2);

        assert!(card.process_messages());
        assert!(card.image_palette().is_some());

        // Later frames reuse the palette
        draw(&mut card, 1000.0);
        draw(&mut card, 800.0);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(posts.load(Ordering::SeqCst), 2);
        assert!(!card.process_messages());
    }

    #[test]
    fn test_palette_for_previous_subject_is_dropped() {
        let (mut card, provider, posts) = counting_card();
        card.on_subject_changed(radiohead());
        provider.complete("radiohead.png", Ok(two_tone()));
        card.process_messages();

        // Start extraction, then switch subjects before it is applied
        draw(&mut card, 1000.0);
        assert!(card.has_pending_work());
        card.on_subject_changed(Subject::new(5, "Next").with_description("No picture"));
        assert!(!card.has_pending_work());

        wait_for_posts(&posts, 2);
        assert!(!card.process_messages());
        assert!(card.image_palette().is_none());
        assert_eq!(*card.active_palette(), Palette::default_palette());

        let commands = draw(&mut card, 1000.0);
        let defaults = card.config().color_scheme();
        assert!(matches!(
            commands[0],
            DrawCommand::Rect { color, .. } if color == defaults.background
        ));
    }

    #[test]
    fn test_clear_subject() {
        let (mut card, provider) = card();
        card.on_subject_changed(radiohead());
        card.clear_subject();

        assert_eq!(provider.is_cancelled("radiohead.png"), Some(true));
        assert!(card.subject().is_none());
        assert_eq!(card.measure(1000.0), 0.0);
    }

    #[test]
    fn test_missing_font_file() {
        let mut config = CardConfig::default();
        config.fonts.font_path = Some("/nonexistent/font.ttf".into());
        let result = CardLayoutModel::new(config, Arc::new(DeferredImageProvider::new()), None);
        assert!(matches!(result, Err(CardError::Font(_))));
    }
}
