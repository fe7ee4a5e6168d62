use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::entry::HttpCacheEntry;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while interacting with a response cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The response body crossed the configured capture bound.
    ///
    /// The remainder of the stream is still drained so the transport
    /// connection is released, and `body` carries the complete payload. The
    /// interceptor uses it to hand the origin response back to the caller
    /// unchanged.
    #[error("response body exceeds the cache limit of {limit} bytes")]
    BodyTooLarge { limit: u64, body: Bytes },

    /// The response body stream failed while being drained.
    #[error("failed to read response body: {0}")]
    Read(#[source] BoxError),

    /// The underlying backend failed.
    ///
    /// Implementations of `put` that fail after the body was already
    /// consumed should attach the captured entry, so the interceptor can
    /// still serve the origin payload.
    #[error("backend error: {message}")]
    Backend {
        message: String,
        entry: Option<Arc<HttpCacheEntry>>,
    },
}

impl CacheError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            entry: None,
        }
    }
}
