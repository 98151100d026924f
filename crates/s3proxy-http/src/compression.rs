//! Response compression.
//!
//! Gzip is applied by `tower_http`'s [`CompressionLayer`] wrapped around the gateway
//! service; this module supplies the whitelist predicate deciding which responses
//! qualify. The layer itself handles `Accept-Encoding` negotiation, sets
//! `Content-Encoding` and `Vary`, and drops `Content-Length`.
//!
//! A response is compressed only when all of the following hold:
//!
//! - its `Content-Type` essence is one of [`COMPRESSIBLE_CONTENT_TYPES`];
//! - its length is at least the configured minimum, or unknown;
//! - it is not already encoded and not a partial (`Content-Range`) response;
//! - the service did not mark it with [`SkipCompression`] (used for `HEAD`).

use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use tower_http::compression::{CompressionLayer, Predicate};

/// Content types eligible for gzip.
pub const COMPRESSIBLE_CONTENT_TYPES: [&str; 4] = [
    "text/plain",
    "text/css",
    "application/json",
    "application/javascript",
];

/// Default minimum response length, in bytes, for gzip.
pub const DEFAULT_MIN_LENGTH: u64 = 1024;

/// Response extension that disables compression for one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCompression;

/// Whitelist predicate for [`CompressionLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipPredicate {
    min_length: u64,
}

impl GzipPredicate {
    /// Create a predicate with the given minimum length.
    #[must_use]
    pub fn new(min_length: u64) -> Self {
        Self { min_length }
    }
}

impl Default for GzipPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LENGTH)
    }
}

impl Predicate for GzipPredicate {
    fn should_compress<B>(&self, response: &http::Response<B>) -> bool
    where
        B: http_body::Body,
    {
        if response.extensions().get::<SkipCompression>().is_some() {
            return false;
        }

        let headers = response.headers();
        if headers.contains_key(CONTENT_RANGE) {
            return false;
        }
        if headers
            .get(CONTENT_ENCODING)
            .is_some_and(|v| !v.as_bytes().eq_ignore_ascii_case(b"identity"))
        {
            return false;
        }

        let is_whitelisted = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok())
            .is_some_and(|m| COMPRESSIBLE_CONTENT_TYPES.contains(&m.essence_str()));
        if !is_whitelisted {
            return false;
        }

        // Unknown length (chunked upstream) is treated as large enough.
        let length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .or_else(|| response.body().size_hint().exact());
        length.is_none_or(|len| len >= self.min_length)
    }
}

/// Build the gzip layer used in front of the gateway service.
#[must_use]
pub fn gzip_layer(min_length: u64) -> CompressionLayer<GzipPredicate> {
    CompressionLayer::new()
        .gzip(true)
        .compress_when(GzipPredicate::new(min_length))
}
