//! Caching decisions per RFC 7234 and RFC 5861.

use std::time::Duration;

use http::header::{AUTHORIZATION, CONTENT_LENGTH, DATE, EXPIRES, RANGE, VARY};
use http::{request, response, HeaderMap, Method};

use crate::cache_control::CacheControl;
use crate::entry::HttpCacheEntry;
use crate::http_date;

/// Statuses a cache may store heuristically (RFC 7231 §6.1).
const CACHEABLE_STATUSES: [u16; 10] = [200, 203, 204, 300, 301, 404, 405, 410, 414, 501];

/// Decides how the interceptor behaves when checking whether a request may
/// be answered from cache, whether a cached response still fulfills a
/// request, and whether a received response is worth storing.
///
/// Implementations should be chosen for the nature of the cache: a shared
/// cache is subject to stricter rules around `private`, `Authorization`,
/// and `proxy-revalidate` than a private, per-user one.
pub trait CachingPolicy: Send + Sync {
    /// Whether the request is eligible to be fulfilled from the cache at
    /// all. A `Cache-Control: no-cache` request, for example, is not.
    fn is_servable_from_cache(&self, request: &request::Parts) -> bool;

    /// Whether the cached entry can fulfill the request at `now_s`
    /// (RFC 7234 §4.2).
    fn is_cached_response_usable(
        &self,
        request: &request::Parts,
        entry: &HttpCacheEntry,
        now_s: u64,
    ) -> bool;

    /// Whether the response received for the request may be stored for
    /// future use (RFC 7234 §3).
    fn is_response_cacheable(
        &self,
        request: &request::Parts,
        response: &response::Parts,
    ) -> bool;

    /// Whether a stale entry may still be served after the origin answered
    /// a conditional request with a server error (RFC 5861).
    fn can_serve_stale_response_if_error(&self, entry: &HttpCacheEntry) -> bool;
}

/// The default [`CachingPolicy`], configurable as a private or shared cache
/// with a response body size bound.
///
/// Known deliberate limitations: responses to range requests are never
/// served or stored, and responses carrying `Vary` are refused rather than
/// keyed by the named headers.
#[derive(Debug, Clone)]
pub struct DefaultCachingPolicy {
    is_shared_cache: bool,
    max_response_body_size: u64,
    default_freshness_s: u64,
}

impl DefaultCachingPolicy {
    /// Creates a policy for a private (`is_shared_cache = false`) or shared
    /// cache that admits responses up to `max_response_body_size` bytes.
    pub fn new(is_shared_cache: bool, max_response_body_size: u64) -> Self {
        Self {
            is_shared_cache,
            max_response_body_size,
            default_freshness_s: 3600,
        }
    }

    /// Freshness applied to cached responses when the origin provides none.
    pub fn default_freshness(&self) -> Duration {
        Duration::from_secs(self.default_freshness_s)
    }

    /// Sets the freshness applied when the origin provides none.
    pub fn set_default_freshness(&mut self, freshness: Duration) {
        self.default_freshness_s = freshness.as_secs();
    }

    pub fn with_default_freshness(mut self, freshness: Duration) -> Self {
        self.set_default_freshness(freshness);
        self
    }

    /// Freshness lifetime of a cached response in seconds (RFC 7234
    /// §4.2.1): shared caches prefer `s-maxage`, then `max-age`, then
    /// `Expires - Date`, then the configured default.
    ///
    /// `Expires - Date` may be negative for responses that arrived already
    /// expired; comparisons against ages are signed for that reason.
    pub fn freshness_lifetime(&self, entry: &HttpCacheEntry) -> i64 {
        let directives = CacheControl::from_headers(entry.headers());
        if self.is_shared_cache {
            if let Some(s_max_age) = directives.s_max_age {
                if s_max_age > 0 {
                    return s_max_age as i64;
                }
            }
        }
        if let Some(max_age) = directives.max_age {
            if max_age > 0 {
                return max_age as i64;
            }
        }
        if let Some(expires_s) = parsed_date(entry.headers(), EXPIRES) {
            if expires_s > 0 {
                let date_s = parsed_date(entry.headers(), DATE).unwrap_or(0);
                return expires_s as i64 - date_s as i64;
            }
        }
        self.default_freshness_s as i64
    }
}

impl CachingPolicy for DefaultCachingPolicy {
    fn is_servable_from_cache(&self, request: &request::Parts) -> bool {
        if request.method != Method::GET {
            return false;
        }
        let directives = CacheControl::from_headers(&request.headers);
        !directives.no_cache
            && !directives.no_store
            && directives.max_age != Some(0)
            && !request.headers.contains_key(RANGE)
    }

    fn is_cached_response_usable(
        &self,
        request: &request::Parts,
        entry: &HttpCacheEntry,
        now_s: u64,
    ) -> bool {
        let request_directives = CacheControl::from_headers(&request.headers);
        let entry_directives = CacheControl::from_headers(entry.headers());
        let age = entry.current_age(now_s) as i64;
        let lifetime = self.freshness_lifetime(entry);

        let mut revalidate = entry_directives.must_revalidate;
        if self.is_shared_cache {
            revalidate = revalidate || entry_directives.proxy_revalidate;
        }

        if !revalidate {
            if let Some(max_stale) = request_directives.max_stale {
                return lifetime + max_stale as i64 > age;
            }
        }
        if let Some(min_fresh) = request_directives.min_fresh {
            return lifetime - min_fresh as i64 > age;
        }
        if let Some(max_age) = request_directives.max_age {
            return age < max_age as i64;
        }
        lifetime > age
    }

    fn is_response_cacheable(
        &self,
        request: &request::Parts,
        response: &response::Parts,
    ) -> bool {
        if !self.is_servable_from_cache(request) {
            return false;
        }
        if !CACHEABLE_STATUSES.contains(&response.status.as_u16()) {
            return false;
        }
        let directives = CacheControl::from_headers(&response.headers);
        if directives.private || directives.no_store {
            return false;
        }
        if self.is_shared_cache && request.headers.contains_key(AUTHORIZATION) {
            // A shared cache only stores authorized responses that are
            // re-authorized through `public` with an explicit `s-maxage`.
            if directives.public && directives.s_max_age.unwrap_or(0) == 0 {
                return false;
            }
        }
        if response.headers.contains_key(VARY) {
            return false;
        }
        if parsed_date(&response.headers, DATE).is_none() {
            return false;
        }
        if let Some(length) = content_length(&response.headers) {
            if length > self.max_response_body_size {
                return false;
            }
        }
        directives.s_max_age.is_some_and(|seconds| seconds > 0)
            || directives.max_age.is_some_and(|seconds| seconds > 0)
            || directives.public
            || parsed_date(&response.headers, EXPIRES)
                .is_some_and(|expires_s| expires_s > http_date::unix_now_s())
    }

    fn can_serve_stale_response_if_error(&self, entry: &HttpCacheEntry) -> bool {
        // The default policy always serves a stale entry over a 5xx.
        // Stricter handling of the `stale-if-error` directive is left to
        // custom policies; the directive is parsed and available on the
        // entry's headers.
        let _ = entry;
        true
    }
}

fn parsed_date(headers: &HeaderMap, name: http::header::HeaderName) -> Option<u64> {
    headers.get(name).and_then(http_date::parse_http_date_s)
}

/// Declared `Content-Length`, treating a missing or malformed header as
/// absent.
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.trim().parse().ok())
}
