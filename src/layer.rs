use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{request, response, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tower::{Layer, Service, ServiceExt};
use tracing::{trace, warn};

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::backend::memory::InMemoryResponseCache;
use crate::backend::HttpResponseCache;
use crate::entry::HttpCacheEntry;
use crate::error::{BoxError, CacheError};
use crate::http_date;
use crate::policy::{CachingPolicy, DefaultCachingPolicy};
use crate::strategy::{
    clone_request_head, ConditionalRequestStrategy, DefaultConditionalRequestStrategy,
};

/// Client-side caching layer for Tower HTTP services.
///
/// The layer wraps a transport service and answers requests from an
/// [`HttpResponseCache`] whenever RFC 7234 semantics permit: a fresh entry
/// is served directly, a stale entry with validators is revalidated through
/// a conditional request, and everything else goes straight to the wrapped
/// service. Responses the [`CachingPolicy`] accepts are captured on the way
/// back.
///
/// Cloning a `CacheLayer` is cheap; clones share the store and the policy
/// and strategy trio, so concurrent callers see one cache.
#[derive(Clone)]
pub struct CacheLayer<C> {
    store: C,
    policy: Arc<dyn CachingPolicy>,
    strategy: Arc<dyn ConditionalRequestStrategy>,
}

/// Builder for configuring [`CacheLayer`] instances.
///
/// The defaults mirror a conservative private client cache: not shared,
/// 1 MiB response body bound, one hour of freshness when the origin gives
/// none, and conditional requests built from `ETag` / `Last-Modified`.
pub struct CacheLayerBuilder<C> {
    store: C,
    shared: bool,
    max_response_body_size: u64,
    default_freshness: Duration,
    policy: Option<Arc<dyn CachingPolicy>>,
    strategy: Arc<dyn ConditionalRequestStrategy>,
}

impl<C> CacheLayerBuilder<C>
where
    C: HttpResponseCache,
{
    pub fn new(store: C) -> Self {
        Self {
            store,
            shared: false,
            max_response_body_size: InMemoryResponseCache::DEFAULT_MAX_RESPONSE_BODY_SIZE,
            default_freshness: Duration::from_secs(3600),
            policy: None,
            strategy: Arc::new(DefaultConditionalRequestStrategy),
        }
    }

    /// Marks the cache as shared (serving multiple users) or private.
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Bounds the response bodies the default policy will admit. Stores
    /// enforce their own capture bound; keep the two aligned.
    pub fn max_response_body_size(mut self, size: u64) -> Self {
        self.max_response_body_size = size;
        self
    }

    /// Freshness applied to cached responses when the origin provides none.
    pub fn default_freshness(mut self, freshness: Duration) -> Self {
        self.default_freshness = freshness;
        self
    }

    /// Replaces the caching policy wholesale. The `shared`,
    /// `max_response_body_size`, and `default_freshness` knobs only apply
    /// to the default policy and are ignored once a custom one is set.
    pub fn policy(mut self, policy: Arc<dyn CachingPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Replaces the conditional request strategy.
    pub fn strategy(mut self, strategy: Arc<dyn ConditionalRequestStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn build(self) -> CacheLayer<C> {
        let policy = self.policy.unwrap_or_else(|| {
            Arc::new(
                DefaultCachingPolicy::new(self.shared, self.max_response_body_size)
                    .with_default_freshness(self.default_freshness),
            )
        });
        CacheLayer {
            store: self.store,
            policy,
            strategy: self.strategy,
        }
    }
}

impl CacheLayer<InMemoryResponseCache> {
    /// Creates a private cache backed by an in-memory store holding up to
    /// `max_capacity` entries, with the default 1 MiB body bound.
    pub fn new_in_memory(max_capacity: u64) -> Self {
        CacheLayerBuilder::new(InMemoryResponseCache::new(
            max_capacity,
            InMemoryResponseCache::DEFAULT_MAX_RESPONSE_BODY_SIZE,
        ))
        .build()
    }
}

impl<C> CacheLayer<C>
where
    C: HttpResponseCache,
{
    /// Builds a cache layer with the default policy and strategy.
    pub fn new(store: C) -> Self {
        CacheLayerBuilder::new(store).build()
    }

    /// Returns a builder for fine-grained control over the collaborators.
    pub fn builder(store: C) -> CacheLayerBuilder<C> {
        CacheLayerBuilder::new(store)
    }

    /// Handle to the shared store, e.g. for `evict` / `clear`.
    pub fn store(&self) -> &C {
        &self.store
    }
}

impl<S, C> Layer<S> for CacheLayer<C>
where
    C: HttpResponseCache,
{
    type Service = CacheService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner,
            store: self.store.clone(),
            policy: self.policy.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

/// The interceptor service produced by [`CacheLayer`].
#[derive(Clone)]
pub struct CacheService<S, C> {
    inner: S,
    store: C,
    policy: Arc<dyn CachingPolicy>,
    strategy: Arc<dyn ConditionalRequestStrategy>,
}

impl<S, C, ReqBody, ResBody> Service<Request<ReqBody>> for CacheService<S, C>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError> + Send,
    ReqBody: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError> + Send,
    C: HttpResponseCache,
{
    type Response = Response<Full<Bytes>>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let inner = self.inner.clone();
        let store = self.store.clone();
        let policy = self.policy.clone();
        let strategy = self.strategy.clone();

        Box::pin(async move {
            let (head, body) = request.into_parts();

            if policy.is_servable_from_cache(&head) {
                let cached = match store.get(&head).await {
                    Ok(cached) => cached,
                    Err(err) => {
                        warn!(method = %head.method, uri = %head.uri, error = %err, "cache lookup failed");
                        None
                    }
                };
                if let Some(entry) = cached {
                    let now_s = http_date::unix_now_s();
                    if policy.is_cached_response_usable(&head, &entry, now_s) {
                        trace!(method = %head.method, uri = %head.uri, "serving response from cache");
                        #[cfg(feature = "metrics")]
                        counter!("tower_http_client_cache.hit").increment(1);
                        return Ok(entry.to_response(Some(entry.current_age(now_s))));
                    }
                    if strategy.can_revalidate(&entry) {
                        let conditional = strategy.create_conditional_request(&head, &entry);
                        trace!(method = %conditional.method, uri = %conditional.uri, "sending conditional request");
                        #[cfg(feature = "metrics")]
                        counter!("tower_http_client_cache.revalidate").increment(1);
                        return execute_and_cache_conditional(
                            inner,
                            store,
                            policy,
                            conditional,
                            body,
                            entry,
                        )
                        .await;
                    }
                }
            } else {
                trace!(method = %head.method, uri = %head.uri, "request not servable from cache");
            }

            execute_and_cache(inner, store, policy, head, body).await
        })
    }
}

/// Executes the request and stores the response when the policy admits it.
/// Store failures degrade to the pass-through origin response.
async fn execute_and_cache<S, C, ReqBody, ResBody>(
    inner: S,
    store: C,
    policy: Arc<dyn CachingPolicy>,
    head: request::Parts,
    body: ReqBody,
) -> Result<Response<Full<Bytes>>, BoxError>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send,
    ResBody::Error: Into<BoxError> + Send,
    C: HttpResponseCache,
{
    #[cfg(feature = "metrics")]
    counter!("tower_http_client_cache.miss").increment(1);

    let request_head = clone_request_head(&head);
    let request_time_s = http_date::unix_now_s();
    let response = inner
        .oneshot(Request::from_parts(head, body))
        .await
        .map_err(Into::into)?;
    let response_time_s = http_date::unix_now_s();

    let (response_head, response_body) = response.into_parts();

    if policy.is_response_cacheable(&request_head, &response_head) {
        trace!(method = %request_head.method, uri = %request_head.uri, "caching response");
        return match store
            .put(
                &request_head,
                &response_head,
                response_body,
                request_time_s,
                response_time_s,
            )
            .await
        {
            Ok(entry) => {
                #[cfg(feature = "metrics")]
                counter!("tower_http_client_cache.store").increment(1);
                Ok(entry.to_response(None))
            }
            Err(err) => recover_from_store_failure(&request_head, response_head, err),
        };
    }

    let collected = response_body.collect().await.map_err(Into::into)?;
    Ok(Response::from_parts(
        response_head,
        Full::from(collected.to_bytes()),
    ))
}

/// Sends the conditional request and resolves the outcome: a 304 refreshes
/// the stored entry, a cacheable response replaces it, a 5xx may fall back
/// to the stale entry, anything else passes through.
async fn execute_and_cache_conditional<S, C, ReqBody, ResBody>(
    inner: S,
    store: C,
    policy: Arc<dyn CachingPolicy>,
    conditional: request::Parts,
    body: ReqBody,
    stale: Arc<HttpCacheEntry>,
) -> Result<Response<Full<Bytes>>, BoxError>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send,
    ResBody::Error: Into<BoxError> + Send,
    C: HttpResponseCache,
{
    let conditional_head = clone_request_head(&conditional);
    let request_time_s = http_date::unix_now_s();
    let response = inner
        .oneshot(Request::from_parts(conditional, body))
        .await
        .map_err(Into::into)?;
    let response_time_s = http_date::unix_now_s();

    let (response_head, response_body) = response.into_parts();

    if response_head.status == StatusCode::NOT_MODIFIED {
        trace!(method = %conditional_head.method, uri = %conditional_head.uri, "not modified, refreshing cache entry");
        return match store
            .put(
                &conditional_head,
                &response_head,
                response_body,
                request_time_s,
                response_time_s,
            )
            .await
        {
            Ok(refreshed) => {
                let entry = match store.get(&conditional_head).await {
                    Ok(Some(entry)) => entry,
                    Ok(None) | Err(_) => refreshed,
                };
                Ok(entry.to_response(None))
            }
            Err(err) => {
                warn!(method = %conditional_head.method, uri = %conditional_head.uri, error = %err, "could not refresh cache entry");
                let now_s = http_date::unix_now_s();
                Ok(stale.to_response(Some(stale.current_age(now_s))))
            }
        };
    }

    if policy.is_response_cacheable(&conditional_head, &response_head) {
        trace!(method = %conditional_head.method, uri = %conditional_head.uri, "conditional request received updated response");
        return match store
            .put(
                &conditional_head,
                &response_head,
                response_body,
                request_time_s,
                response_time_s,
            )
            .await
        {
            Ok(entry) => {
                #[cfg(feature = "metrics")]
                counter!("tower_http_client_cache.store").increment(1);
                Ok(entry.to_response(None))
            }
            Err(err) => recover_from_store_failure(&conditional_head, response_head, err),
        };
    }

    if response_head.status.is_server_error()
        && policy.can_serve_stale_response_if_error(&stale)
    {
        trace!(method = %conditional_head.method, uri = %conditional_head.uri, "serving stale entry after origin error");
        #[cfg(feature = "metrics")]
        counter!("tower_http_client_cache.stale_served").increment(1);
        // Dropping the 5xx body releases the transport response.
        drop(response_body);
        let now_s = http_date::unix_now_s();
        return Ok(stale.to_response(Some(stale.current_age(now_s))));
    }

    let collected = response_body.collect().await.map_err(Into::into)?;
    Ok(Response::from_parts(
        response_head,
        Full::from(collected.to_bytes()),
    ))
}

/// Degrades a failed store write to the origin response whenever the
/// payload is recoverable. The cache never turns an origin success into a
/// failure unless the body stream itself broke.
fn recover_from_store_failure(
    request: &request::Parts,
    head: response::Parts,
    err: CacheError,
) -> Result<Response<Full<Bytes>>, BoxError> {
    warn!(method = %request.method, uri = %request.uri, error = %err, "could not cache response");
    #[cfg(feature = "metrics")]
    counter!("tower_http_client_cache.store_error").increment(1);
    match err {
        CacheError::BodyTooLarge { body, .. } => Ok(Response::from_parts(head, Full::from(body))),
        CacheError::Backend {
            entry: Some(entry), ..
        } => Ok(entry.to_response(None)),
        CacheError::Read(source) => Err(source),
        err @ CacheError::Backend { entry: None, .. } => Err(err.into()),
    }
}
