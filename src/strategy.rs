//! Conditional request construction for revalidating stale entries.

use http::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use http::{request, Request};

use crate::entry::HttpCacheEntry;

/// Builds the conditional requests used to revalidate stale cache entries
/// against the origin.
pub trait ConditionalRequestStrategy: Send + Sync {
    /// Whether the cached entry carries validators the origin can answer
    /// `304 Not Modified` to.
    fn can_revalidate(&self, entry: &HttpCacheEntry) -> bool;

    /// Returns a clone of the request head augmented with the entry's
    /// validators.
    fn create_conditional_request(
        &self,
        request: &request::Parts,
        entry: &HttpCacheEntry,
    ) -> request::Parts;
}

/// Default strategy: revalidate through `ETag` / `If-None-Match` and
/// `Last-Modified` / `If-Modified-Since` (RFC 7232).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConditionalRequestStrategy;

impl ConditionalRequestStrategy for DefaultConditionalRequestStrategy {
    fn can_revalidate(&self, entry: &HttpCacheEntry) -> bool {
        entry.headers().contains_key(ETAG) || entry.headers().contains_key(LAST_MODIFIED)
    }

    fn create_conditional_request(
        &self,
        request: &request::Parts,
        entry: &HttpCacheEntry,
    ) -> request::Parts {
        let mut conditional = clone_request_head(request);
        if let Some(etag) = entry.headers().get(ETAG) {
            conditional.headers.insert(IF_NONE_MATCH, etag.clone());
        }
        if let Some(last_modified) = entry.headers().get(LAST_MODIFIED) {
            conditional
                .headers
                .insert(IF_MODIFIED_SINCE, last_modified.clone());
        }
        conditional
    }
}

/// Copies the method, URI, version, and headers of a request head.
/// Extensions are not carried over.
pub(crate) fn clone_request_head(parts: &request::Parts) -> request::Parts {
    let (mut clone, _body) = Request::new(()).into_parts();
    clone.method = parts.method.clone();
    clone.uri = parts.uri.clone();
    clone.version = parts.version;
    clone.headers = parts.headers.clone();
    clone
}
