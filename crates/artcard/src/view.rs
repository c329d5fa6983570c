//! Host-facing view interface
//!
//! The host toolkit owns the rendering thread. It asks the card how tall it
//! is, gives it a canvas to draw into, and pumps its message queue whenever
//! the redraw hook fires.

use crate::subject::Subject;
use artcard_render::Canvas;

/// A card the host can measure, draw and feed subjects to
pub trait CardView {
    /// Lay the card out for `available_width` and return its height.
    fn measure(&mut self, available_width: f32) -> f32;

    /// Paint the card. The canvas width is the width drawn at.
    fn draw(&mut self, canvas: &mut dyn Canvas);

    /// Replace the displayed subject, superseding all in-flight work.
    fn on_subject_changed(&mut self, subject: Subject);

    /// Apply queued asynchronous results. Returns true if a redraw is needed.
    fn process_messages(&mut self) -> bool;
}
