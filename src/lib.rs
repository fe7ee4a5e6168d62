//! Tower HTTP Client Cache
//! ========================
//!
//! `tower-http-client-cache` is an RFC 7234 (HTTP/1.1 Caching) and RFC 5861
//! (stale content extensions) response cache for Tower-based HTTP clients.
//! It sits between a client and its transport, transparently storing origin
//! responses and answering later requests from local storage whenever cache
//! semantics permit: fresh entries are served directly, stale entries with
//! validators are revalidated through conditional requests, and a stale
//! entry can stand in when revalidation hits a server error.
//!
//! The single [`CacheLayer`] entry point is configured with a trio of
//! collaborators: an [`HttpResponseCache`] store, a [`CachingPolicy`]
//! (private or shared, with a response body size bound), and a
//! [`ConditionalRequestStrategy`]. Most consumers start from
//! [`CacheLayer::builder`] with the in-memory store:
//!
//! ```no_run
//! use std::time::Duration;
//! use tower::{Service, ServiceBuilder, ServiceExt};
//! use tower_http_client_cache::prelude::*;
//!
//! # async fn run() -> Result<(), tower_http_client_cache::error::BoxError> {
//! let layer = CacheLayer::builder(InMemoryResponseCache::new(1_000, 1024 * 1024))
//!     .shared(false)
//!     .default_freshness(Duration::from_secs(300))
//!     .build();
//!
//! let mut client = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(tower::service_fn(|_req: http::Request<()>| async {
//!         Ok::<_, std::convert::Infallible>(http::Response::new(http_body_util::Full::from("ok")))
//!     }));
//!
//! let response = client
//!     .ready()
//!     .await?
//!     .call(http::Request::get("http://example.org/resource").body(())?)
//!     .await?;
//! # drop(response);
//! # Ok(())
//! # }
//! ```
//!
//! ## Semantics and limitations
//!
//! Only GET requests are cached, keyed by absolute request URI. Responses
//! carrying `Vary` and responses to range requests are never stored.
//! Revalidation is synchronous; there is no background
//! stale-while-revalidate. Failures inside the cache degrade to a direct
//! pass-through: the layer never turns a successful origin response into an
//! error.

pub mod backend;
pub mod cache_control;
pub mod entry;
pub mod error;
mod http_date;
pub mod layer;
pub mod policy;
pub mod prelude;
pub mod strategy;

pub use cache_control::CacheControl;
pub use entry::HttpCacheEntry;
pub use error::{BoxError, CacheError};
pub use layer::{CacheLayer, CacheLayerBuilder, CacheService};
pub use policy::{CachingPolicy, DefaultCachingPolicy};
pub use strategy::{ConditionalRequestStrategy, DefaultConditionalRequestStrategy};
