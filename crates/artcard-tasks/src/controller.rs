//! Per-card image request state machine.
//!
//! `Idle -> Loading -> {Loaded, Failed}`, and back to `Loading` (or `Idle`
//! for a subject without an image) on every subject change. Only the newest
//! request's completion is ever accepted.

use crate::mailbox::Mailbox;
use crate::message::{CardMessage, RequestToken};
use crate::provider::{ImageProvider, RequestHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the current subject's image request stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading(RequestToken),
    Loaded(RequestToken),
    Failed(RequestToken),
}

/// Issues, supersedes and validates image requests for one card
pub struct ImageLoadController {
    provider: Arc<dyn ImageProvider>,
    mailbox: Mailbox,
    last_token: u64,
    in_flight: Option<RequestHandle>,
    state: LoadState,
}

impl ImageLoadController {
    pub fn new(provider: Arc<dyn ImageProvider>, mailbox: Mailbox) -> Self {
        Self {
            provider,
            mailbox,
            last_token: 0,
            in_flight: None,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading(_))
    }

    /// Token of the request whose completion would currently be accepted.
    pub fn active_token(&self) -> Option<RequestToken> {
        match self.state {
            LoadState::Loading(token) => Some(token),
            _ => None,
        }
    }

    /// Supersede whatever is in flight and request `image_uri`, if any.
    ///
    /// Returns the new request's token, or `None` when there is nothing to
    /// load and the controller went back to `Idle`.
    pub fn set_subject(&mut self, image_uri: Option<&str>) -> Option<RequestToken> {
        self.cancel();

        let Some(uri) = image_uri.map(str::trim).filter(|u| !u.is_empty()) else {
            debug!("No image reference, staying idle");
            return None;
        };

        self.last_token += 1;
        let token = RequestToken(self.last_token);

        // State is set before any completion can be processed: completions
        // only arrive through the mailbox, which is drained later.
        self.state = LoadState::Loading(token);

        let mailbox = self.mailbox.clone();
        let handle = self.provider.request(
            uri,
            Box::new(move |result| {
                let msg = match result {
                    Ok(image) => CardMessage::ImageLoaded { token, image },
                    Err(error) => CardMessage::ImageFailed { token, error },
                };
                mailbox.post(msg);
            }),
        );
        self.in_flight = Some(handle);

        info!("{} issued for {}", token, uri);
        Some(token)
    }

    /// Cancel the in-flight request, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.cancel();
            if let Some(token) = self.active_token() {
                debug!("{} cancelled", token);
            }
        }
        self.state = LoadState::Idle;
    }

    /// Check a completion against the active request and move to `Loaded`
    /// or `Failed` if it matches.
    ///
    /// Returns false for stale or duplicate completions, which the caller
    /// must drop without touching any state.
    pub fn accept(&mut self, token: RequestToken, success: bool) -> bool {
        match self.state {
            LoadState::Loading(active) if active == token => {
                self.in_flight = None;
                self.state = if success {
                    LoadState::Loaded(token)
                } else {
                    LoadState::Failed(token)
                };
                debug!("{} completed ({})", token, if success { "loaded" } else { "failed" });
                true
            }
            _ => {
                debug!("Discarding stale completion for {} (state {:?})", token, self.state);
                false
            }
        }
    }
}

impl Drop for ImageLoadController {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.cancel();
        }
    }
}
