//! Cached response snapshots and RFC 7234 age arithmetic.

use bytes::Bytes;
use http::header::{AGE, DATE};
use http::response::Parts;
use http::{HeaderMap, HeaderValue, Response, StatusCode, Version};
use http_body_util::Full;

use crate::http_date;

/// Immutable snapshot of an origin response plus the timing metadata needed
/// for age calculations (RFC 7234 §4.2.3).
///
/// Entries are created when a response is stored and never mutated
/// afterwards; the store hands them out as `Arc<HttpCacheEntry>` so
/// concurrent readers share one copy. Responses served from an entry are
/// built through [`HttpCacheEntry::to_response`], which may override the
/// `Age` header on the returned view without touching the entry itself.
#[derive(Debug, Clone)]
pub struct HttpCacheEntry {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    request_time_s: u64,
    response_time_s: u64,
    corrected_initial_age_s: u64,
}

impl HttpCacheEntry {
    /// Captures a response head and body observed at the given wall-clock
    /// times (unix seconds).
    ///
    /// A request time after the response time is clamped down to it. The
    /// corrected initial age derives from the origin's `Age` and `Date`
    /// headers, each treated as 0 when missing or unparseable:
    ///
    /// ```text
    /// apparent_age        = max(0, response_time - date)
    /// corrected_age_value = age + (response_time - request_time)
    /// corrected_initial_age = max(apparent_age, corrected_age_value)
    /// ```
    pub fn new(head: &Parts, body: Bytes, request_time_s: u64, response_time_s: u64) -> Self {
        let request_time_s = request_time_s.min(response_time_s);
        let age_header_s = head
            .headers
            .get(AGE)
            .and_then(http_date::parse_delta_seconds)
            .unwrap_or(0);
        let date_header_s = head
            .headers
            .get(DATE)
            .and_then(http_date::parse_http_date_s)
            .unwrap_or(0);

        let apparent_age = response_time_s.saturating_sub(date_header_s);
        let corrected_age_value = age_header_s + (response_time_s - request_time_s);

        Self {
            status: head.status,
            version: head.version,
            headers: head.headers.clone(),
            body,
            request_time_s,
            response_time_s,
            corrected_initial_age_s: apparent_age.max(corrected_age_value),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Unix seconds at which the originating request was sent.
    pub fn request_time_s(&self) -> u64 {
        self.request_time_s
    }

    /// Unix seconds at which the response was received.
    pub fn response_time_s(&self) -> u64 {
        self.response_time_s
    }

    /// The entry's age at the moment it was stored.
    pub fn corrected_initial_age_s(&self) -> u64 {
        self.corrected_initial_age_s
    }

    /// Estimated age of the response at `now_s`, in whole seconds.
    pub fn current_age(&self, now_s: u64) -> u64 {
        self.corrected_initial_age_s + now_s.saturating_sub(self.response_time_s)
    }

    /// Builds a response view over the entry.
    ///
    /// Body, status, and headers read through from the snapshot. When `age`
    /// is given, the view's `Age` header carries it; the stored entry keeps
    /// whatever the origin sent.
    pub fn to_response(&self, age: Option<u64>) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers.clone();
        if let Some(age) = age {
            if let Ok(value) = HeaderValue::from_str(&age.to_string()) {
                response.headers_mut().insert(AGE, value);
            }
        }
        response
    }
}
