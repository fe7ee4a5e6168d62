//! Re-exports for consumers who prefer a single import.
//!
//! ```no_run
//! use tower_http_client_cache::prelude::*;
//! # use std::time::Duration;
//! # let store = InMemoryResponseCache::new(128, 1024 * 1024);
//! let layer = CacheLayer::builder(store)
//!     .default_freshness(Duration::from_secs(30))
//!     .build();
//! ```

pub use crate::backend::memory::InMemoryResponseCache;
pub use crate::backend::HttpResponseCache;
pub use crate::cache_control::CacheControl;
pub use crate::entry::HttpCacheEntry;
pub use crate::error::{BoxError, CacheError};
pub use crate::layer::{CacheLayer, CacheLayerBuilder, CacheService};
pub use crate::policy::{CachingPolicy, DefaultCachingPolicy};
pub use crate::strategy::{ConditionalRequestStrategy, DefaultConditionalRequestStrategy};
