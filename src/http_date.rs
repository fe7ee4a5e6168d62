//! Header time parsing helpers.
//!
//! All cache arithmetic runs on whole unix seconds. Parse failures degrade
//! to `None` rather than propagating; callers treat an unparseable header as
//! absent.

use std::time::{SystemTime, UNIX_EPOCH};

use http::HeaderValue;

/// Current wall-clock time in unix seconds.
pub(crate) fn unix_now_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Parses an RFC 1123 date header (`Date`, `Expires`, `Last-Modified`) into
/// unix seconds. Pre-epoch dates count as unparseable.
pub(crate) fn parse_http_date_s(value: &HeaderValue) -> Option<u64> {
    let text = value.to_str().ok()?;
    let time = httpdate::parse_http_date(text).ok()?;
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|elapsed| elapsed.as_secs())
}

/// Parses a delta-seconds header such as `Age`.
pub(crate) fn parse_delta_seconds(value: &HeaderValue) -> Option<u64> {
    value.to_str().ok()?.trim().parse().ok()
}
