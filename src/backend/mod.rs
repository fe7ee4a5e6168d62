//! Storage backends for the client cache.
//!
//! The interceptor requires an [`HttpResponseCache`] implementation to hold
//! captured responses. This module ships with
//! [`memory::InMemoryResponseCache`], a process-local store backed by
//! [`moka`]. Backends answer lookups by derived cache key, capture response
//! bodies under the configured size bound, and handle eviction.

pub mod memory;

use std::pin::pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{request, response};
use http_body::Body;
use http_body_util::BodyExt;

use crate::entry::HttpCacheEntry;
use crate::error::{BoxError, CacheError};

/// Initial capacity for body capture buffers.
const CAPTURE_BUFFER_SIZE: usize = 4096;

/// Derives the cache key for a request: the absolute request URI.
///
/// Keys are deliberately header-independent, and only GET requests ever
/// reach the store, so the method is implicit. Content negotiation is
/// refused at the policy level (`Vary` responses are not cacheable) instead
/// of being folded into the key.
pub fn cache_key(request: &request::Parts) -> String {
    request.uri.to_string()
}

/// Store for captured HTTP responses, keyed by request.
///
/// Implementations must be safe for concurrent `get`/`put`/`evict`/`clear`;
/// clones share the same underlying storage. Two racing `put`s for one key
/// produce an unspecified winner, which is fine: entries are
/// interchangeable snapshots of the same resource.
#[async_trait]
pub trait HttpResponseCache: Clone + Send + Sync + 'static {
    /// Returns the cached entry for the request, or `None` on a miss.
    async fn get(
        &self,
        request: &request::Parts,
    ) -> Result<Option<Arc<HttpCacheEntry>>, CacheError>;

    /// Drains the response body, builds an entry, and stores it under the
    /// request's key.
    ///
    /// The body is consumed frame by frame with the cumulative length
    /// checked against the store's bound as each frame arrives; when the
    /// bound is crossed the result is [`CacheError::BodyTooLarge`] carrying
    /// the fully drained payload. The response head is borrowed so the
    /// caller can rebuild a pass-through response on failure.
    async fn put<B>(
        &self,
        request: &request::Parts,
        head: &response::Parts,
        body: B,
        request_time_s: u64,
        response_time_s: u64,
    ) -> Result<Arc<HttpCacheEntry>, CacheError>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>;

    /// Removes the entry at the request's key, if any.
    async fn evict(&self, request: &request::Parts) -> Result<(), CacheError>;

    /// Removes every entry.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// Drains `body` completely, enforcing `limit` on cumulative bytes read.
///
/// The overrun decision is made as each frame arrives, never by measuring a
/// completed buffer. Once the limit is crossed the remainder is still
/// drained (the transport stream has to be released and the caller still
/// needs the payload) and the error carries the complete bytes.
pub(crate) async fn collect_body_bounded<B>(body: B, limit: u64) -> Result<Bytes, CacheError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<BoxError>,
{
    let mut body = pin!(body);
    let mut collected = BytesMut::with_capacity(CAPTURE_BUFFER_SIZE);
    let mut overrun = false;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|source| CacheError::Read(source.into()))?;
        if let Ok(data) = frame.into_data() {
            if !overrun && collected.len() as u64 + data.len() as u64 > limit {
                overrun = true;
            }
            collected.extend_from_slice(&data);
        }
    }

    let bytes = collected.freeze();
    if overrun {
        return Err(CacheError::BodyTooLarge { limit, body: bytes });
    }
    Ok(bytes)
}
