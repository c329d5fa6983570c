//! artcard-demo: render one artist card to a PNG
//!
//! Plays the host's part: loads a subject, measures and draws the card,
//! then keeps pumping its messages until the image and palette arrive
//! (or the timeout runs out) and saves the last frame.

use anyhow::{Context, Result, bail};
use artcard::render::PixelCanvas;
use artcard::tasks::{FileImageProvider, RedrawHook};
use artcard::{CardConfig, CardLayoutModel, CardView, Subject};
use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, bounded};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Render an artist card for a subject JSON file.
#[derive(Parser, Debug)]
#[command(name = "artcard-demo", version, about = "Render an artist card to PNG")]
struct Args {
    /// Subject JSON: id, name, description, albums_count, tracks_count, image_uri
    #[arg(long)]
    subject: PathBuf,

    /// Card configuration JSON (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Card width in pixels
    #[arg(long, default_value_t = 1000)]
    width: u32,

    /// Output PNG
    #[arg(long, default_value = "card.png")]
    out: PathBuf,

    /// How long to wait for the image and palette
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Debug logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .compact()
        .init();

    if args.width == 0 {
        bail!("--width must be > 0");
    }

    let subject = load_subject(&args.subject)?;
    let config = match &args.config {
        Some(path) => CardConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CardConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("artcard-io")
        .enable_all()
        .build()
        .context("starting image runtime")?;

    // Coalesce wake-ups: one pending redraw is enough
    let (wake_tx, wake_rx) = bounded::<()>(1);
    let redraw: RedrawHook = Arc::new(move || {
        let _ = wake_tx.try_send(());
    });

    let provider = Arc::new(FileImageProvider::new(runtime.handle().clone()));
    let mut card =
        CardLayoutModel::new(config, provider, Some(redraw)).context("building card")?;

    info!("Rendering {} at width {}", subject.name, args.width);
    card.on_subject_changed(subject);

    let width = args.width as f32;
    let mut frame = render_frame(&mut card, width);
    let mut frames = 1;

    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    while card.has_pending_work() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match wake_rx.recv_timeout(remaining) {
            Ok(()) => {
                if card.process_messages() {
                    // Drawing a freshly loaded image also starts its palette
                    frame = render_frame(&mut card, width);
                    frames += 1;
                } else {
                    debug!("Woken without visible changes");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Timed out after {} ms, saving the current frame", args.timeout_ms);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    frame
        .save_png(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!(
        "Wrote {} ({} frame{}, state {:?})",
        args.out.display(),
        frames,
        if frames == 1 { "" } else { "s" },
        card.load_state()
    );

    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(())
}

/// Measure, then draw into a canvas of exactly the measured height.
fn render_frame(card: &mut CardLayoutModel, width: f32) -> PixelCanvas {
    let height = card.measure(width).ceil().max(1.0) as u32;
    let mut canvas = PixelCanvas::new(width as u32, height);
    if let Some(font) = card.font() {
        canvas = canvas.with_font(font);
    }
    card.draw(&mut canvas);
    canvas
}

/// Read a subject, resolving a relative image path against the file's
/// directory.
fn load_subject(path: &Path) -> Result<Subject> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading subject {}", path.display()))?;
    let mut subject: Subject = serde_json::from_str(&text)
        .with_context(|| format!("parsing subject {}", path.display()))?;

    let resolved = subject
        .image_uri()
        .filter(|uri| !uri.contains("://") && Path::new(uri).is_relative())
        .map(|uri| {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            base.join(uri).display().to_string()
        });
    if resolved.is_some() {
        subject.image_uri = resolved;
    }
    Ok(subject)
}
