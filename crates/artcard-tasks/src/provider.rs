//! Image provider seam
//!
//! The card never fetches images itself. It hands a URI to an
//! `ImageProvider` and gets a cancellable handle back; the provider calls
//! the completion exactly once, from any thread, unless it was cancelled
//! first.

use artcard_render::LoadedImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use url::Url;

/// Image loading errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Invalid image URI: {0}")]
    InvalidUri(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Image decoding error: {0}")]
    Decode(String),

    #[error("Task error: {0}")]
    Task(String),
}

/// Called once with the outcome of a request
pub type Completion = Box<dyn FnOnce(Result<LoadedImage, LoadError>) + Send + 'static>;

/// Asynchronous source of decoded images
pub trait ImageProvider: Send + Sync {
    /// Start loading `uri`. Must not block on the load itself.
    fn request(&self, uri: &str, on_complete: Completion) -> RequestHandle;
}

/// Best-effort cancellation for one request
#[derive(Debug, Default)]
pub struct RequestHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl RequestHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also abort this tokio task on cancel.
    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Flag the provider polls to skip remaining work.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel the request. A completion may still race through; callers
    /// detect that with request tokens.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

/// Loads `file://` URIs and plain paths on a tokio runtime
#[derive(Debug, Clone)]
pub struct FileImageProvider {
    runtime: Handle,
}

impl FileImageProvider {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Map a URI to a local path. Bare paths are accepted as-is.
    pub fn resolve_path(uri: &str) -> Result<PathBuf, LoadError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(LoadError::InvalidUri("empty".to_string()));
        }

        match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| LoadError::InvalidUri(uri.to_string())),
            Ok(url) => Err(LoadError::InvalidUri(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                uri
            ))),
            Err(_) => Ok(PathBuf::from(uri)),
        }
    }
}

impl ImageProvider for FileImageProvider {
    fn request(&self, uri: &str, on_complete: Completion) -> RequestHandle {
        let handle = RequestHandle::new();

        let path = match Self::resolve_path(uri) {
            Ok(path) => path,
            Err(e) => {
                warn!("Rejecting image request: {}", e);
                on_complete(Err(e));
                return handle;
            }
        };

        let cancelled = handle.cancel_flag();
        let task = self.runtime.spawn(async move {
            let start = Instant::now();

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    on_complete(Err(LoadError::Io(format!("{}: {}", path.display(), e))));
                    return;
                }
            };

            if cancelled.load(Ordering::Acquire) {
                debug!("Skipping decode of cancelled {}", path.display());
                return;
            }

            // Decoding is CPU-bound, keep it off the async workers
            let decoded = tokio::task::spawn_blocking(move || LoadedImage::decode(&bytes)).await;
            let result = match decoded {
                Ok(Ok(image)) => Ok(image),
                Ok(Err(e)) => Err(LoadError::Decode(e.to_string())),
                Err(e) => Err(LoadError::Task(e.to_string())),
            };

            if cancelled.load(Ordering::Acquire) {
                debug!("Dropping result of cancelled {}", path.display());
                return;
            }

            debug!("Loaded {} in {:?}", path.display(), start.elapsed());
            on_complete(result);
        });

        handle.with_abort(task.abort_handle())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use deferred::DeferredImageProvider;

#[cfg(any(test, feature = "test-support"))]
mod deferred {
    use super::*;
    use std::sync::{Mutex, PoisonError};

    struct Pending {
        uri: String,
        cancelled: Arc<AtomicBool>,
        completion: Completion,
    }

    /// Provider whose requests complete only when a test says so
    ///
    /// Completing a cancelled request still invokes its completion, which
    /// is how a cancellation/completion race is reproduced.
    #[derive(Default)]
    pub struct DeferredImageProvider {
        pending: Mutex<Vec<Pending>>,
        log: Mutex<Vec<String>>,
    }

    impl DeferredImageProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every URI requested so far, in order.
        pub fn requested(&self) -> Vec<String> {
            self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn pending_count(&self) -> usize {
            self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Whether the oldest pending request for `uri` has been cancelled.
        pub fn is_cancelled(&self, uri: &str) -> Option<bool> {
            let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending
                .iter()
                .find(|p| p.uri == uri)
                .map(|p| p.cancelled.load(Ordering::Acquire))
        }

        /// Complete the oldest pending request for `uri`.
        pub fn complete(&self, uri: &str, result: Result<LoadedImage, LoadError>) -> bool {
            let pending = {
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                match pending.iter().position(|p| p.uri == uri) {
                    Some(index) => pending.remove(index),
                    None => return false,
                }
            };
            (pending.completion)(result);
            true
        }
    }

    impl ImageProvider for DeferredImageProvider {
        fn request(&self, uri: &str, on_complete: Completion) -> RequestHandle {
            let handle = RequestHandle::new();
            self.log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(uri.to_string());
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Pending {
                    uri: uri.to_string(),
                    cancelled: handle.cancel_flag(),
                    completion: on_complete,
                });
            handle
        }
    }
}
