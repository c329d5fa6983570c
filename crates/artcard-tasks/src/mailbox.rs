//! Delivery of background results onto the rendering thread.

use crate::message::CardMessage;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Called after a message is posted; the host schedules a redraw from it.
///
/// Runs on whichever thread posted, so it must only signal, never draw.
pub type RedrawHook = Arc<dyn Fn() + Send + Sync>;

/// Sending half of a card's message queue
#[derive(Clone)]
pub struct Mailbox {
    tx: Sender<CardMessage>,
    redraw: Option<RedrawHook>,
}

impl Mailbox {
    /// Create a mailbox and the receiver the rendering thread drains.
    pub fn channel() -> (Self, Receiver<CardMessage>) {
        let (tx, rx) = unbounded();
        (Self { tx, redraw: None }, rx)
    }

    pub fn with_redraw_hook(mut self, hook: RedrawHook) -> Self {
        self.redraw = Some(hook);
        self
    }

    /// Queue `msg` and request a redraw. Returns false if the card is gone.
    pub fn post(&self, msg: CardMessage) -> bool {
        let kind = msg.kind();
        if self.tx.send(msg).is_err() {
            debug!("Mailbox closed, dropping {}", kind);
            return false;
        }
        if let Some(hook) = &self.redraw {
            hook();
        }
        true
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("queued", &self.tx.len())
            .field("redraw_hook", &self.redraw.is_some())
            .finish()
    }
}
