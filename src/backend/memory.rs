use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{request, response};
use http_body::Body;
use moka::future::Cache;

use super::{cache_key, collect_body_bounded, HttpResponseCache};
use crate::entry::HttpCacheEntry;
use crate::error::{BoxError, CacheError};

/// An in-memory [`HttpResponseCache`] backed by [`moka`].
///
/// The store is cheap to clone and shares a single underlying map. Capacity
/// is expressed in number of cached entries; beyond that the map evicts on
/// its own, which the interceptor treats the same as any other miss.
#[derive(Clone)]
pub struct InMemoryResponseCache {
    cache: Cache<String, Arc<HttpCacheEntry>>,
    max_response_body_size: u64,
}

impl InMemoryResponseCache {
    /// Capture bound applied when none is given: 1 MiB per response.
    pub const DEFAULT_MAX_RESPONSE_BODY_SIZE: u64 = 1024 * 1024;

    /// Creates a store holding up to `max_capacity` entries, capturing
    /// response bodies up to `max_response_body_size` bytes.
    pub fn new(max_capacity: u64, max_response_body_size: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
            max_response_body_size,
        }
    }

    pub fn max_response_body_size(&self) -> u64 {
        self.max_response_body_size
    }
}

#[async_trait]
impl HttpResponseCache for InMemoryResponseCache {
    async fn get(
        &self,
        request: &request::Parts,
    ) -> Result<Option<Arc<HttpCacheEntry>>, CacheError> {
        Ok(self.cache.get(&cache_key(request)).await)
    }

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
        B::Error: Into<BoxError>,
    {
        let bytes = collect_body_bounded(body, self.max_response_body_size).await?;
        let entry = Arc::new(HttpCacheEntry::new(
            head,
            bytes,
            request_time_s,
            response_time_s,
        ));
        self.cache.insert(cache_key(request), entry.clone()).await;
        Ok(entry)
    }

    async fn evict(&self, request: &request::Parts) -> Result<(), CacheError> {
        self.cache.invalidate(&cache_key(request)).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        Ok(())
    }
}
