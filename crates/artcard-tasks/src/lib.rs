//! artcard tasks - asynchronous work for the artist card
//!
//! Image loading and palette extraction run off the rendering thread and
//! report back through a `Mailbox`:
//! - `ImageLoadController` keeps at most one live image request per card
//! - `PaletteExtractor` quantizes images on a worker thread
//! - every result is tagged with a request token or generation so the
//!   card can drop superseded work

mod controller;
mod extractor;
mod mailbox;
mod message;
mod provider;

pub use controller::{ImageLoadController, LoadState};
pub use extractor::{ExtractError, PaletteExtractor};
pub use mailbox::{Mailbox, RedrawHook};
pub use message::{CardMessage, Generation, RequestToken};
pub use provider::{Completion, FileImageProvider, ImageProvider, LoadError, RequestHandle};

#[cfg(any(test, feature = "test-support"))]
pub use provider::DeferredImageProvider;
