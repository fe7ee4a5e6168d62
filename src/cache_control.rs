//! `Cache-Control` header parsing.
//!
//! The parser is deliberately forgiving: directive names are matched
//! case-insensitively, unrecognized directives are skipped, and a malformed
//! numeric argument drops only the directive it belongs to. An absent header
//! parses to a record with every field at its default.

use http::header::CACHE_CONTROL;
use http::HeaderMap;

/// Parsed `Cache-Control` directives from a request or response.
///
/// Numeric directives are `None` when unset; boolean directives default to
/// `false`. When a directive repeats, the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub s_max_age: Option<u64>,
    pub max_stale: Option<u64>,
    pub min_fresh: Option<u64>,
    pub stale_while_revalidate: Option<u64>,
    pub stale_if_error: Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
    pub must_revalidate: bool,
    pub proxy_revalidate: bool,
    pub no_transform: bool,
    pub public: bool,
    pub private: bool,
}

impl CacheControl {
    /// Parses every `Cache-Control` header in `headers`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut directives = Self::default();
        for value in headers.get_all(CACHE_CONTROL) {
            if let Ok(text) = value.to_str() {
                directives.merge(text);
            }
        }
        directives
    }

    /// Parses a single header value.
    pub fn parse(value: &str) -> Self {
        let mut directives = Self::default();
        directives.merge(value);
        directives
    }

    fn merge(&mut self, value: &str) {
        for token in value.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (name, argument) = match token.split_once('=') {
                Some((name, argument)) => (name.trim(), Some(argument.trim())),
                None => (token, None),
            };
            match name.to_ascii_lowercase().as_str() {
                "max-age" => merge_seconds(&mut self.max_age, argument),
                "s-maxage" => merge_seconds(&mut self.s_max_age, argument),
                "max-stale" => merge_seconds(&mut self.max_stale, argument),
                "min-fresh" => merge_seconds(&mut self.min_fresh, argument),
                "stale-while-revalidate" => {
                    merge_seconds(&mut self.stale_while_revalidate, argument)
                }
                "stale-if-error" => merge_seconds(&mut self.stale_if_error, argument),
                "no-cache" => self.no_cache = true,
                "no-store" => self.no_store = true,
                "must-revalidate" => self.must_revalidate = true,
                "proxy-revalidate" => self.proxy_revalidate = true,
                "no-transform" => self.no_transform = true,
                "public" => self.public = true,
                "private" => self.private = true,
                _ => {}
            }
        }
    }
}

/// Updates `slot` when `argument` holds a valid delta-seconds value; a
/// missing or malformed argument leaves the previous value in place.
fn merge_seconds(slot: &mut Option<u64>, argument: Option<&str>) {
    if let Some(seconds) = argument.and_then(parse_seconds) {
        *slot = Some(seconds);
    }
}

fn parse_seconds(argument: &str) -> Option<u64> {
    let argument = argument
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(argument);
    argument.parse().ok()
}
