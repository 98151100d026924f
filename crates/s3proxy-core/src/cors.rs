//! Cross-origin policy for the proxy route.
//!
//! The gateway answers every browser request on `/{region}/{bucket}/...` with the same
//! permissive policy: any origin, the requested methods and headers echoed back, a fixed
//! max-age, and a fixed list of exposed headers. The headers are attached with "always"
//! semantics: whatever the upstream sent under the same names is discarded first, so each
//! name appears exactly once on the wire.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD,
};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Value of `Access-Control-Allow-Origin`.
pub const ALLOW_ORIGIN: &str = "*";

/// Value of `Access-Control-Max-Age`, in seconds.
pub const MAX_AGE: &str = "3000";

/// Value of `Access-Control-Expose-Headers`.
pub const EXPOSE_HEADERS: &str = "Content-Length, Content-Range, x-amz-meta-helium, \
                                  x-amz-bucket-region, x-amz-delete-marker, x-amz-version-id";

/// Every response header name owned by the policy.
pub static CORS_RESPONSE_HEADERS: [HeaderName; 5] = [
    ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_EXPOSE_HEADERS,
];

/// CORS response headers computed from one inbound request.
///
/// # Examples
///
/// ```
/// use http::HeaderMap;
/// use s3proxy_core::cors::CorsHeaders;
///
/// let mut request = HeaderMap::new();
/// request.insert("access-control-request-method", "PUT".parse().unwrap());
///
/// let cors = CorsHeaders::from_request(&request);
/// let mut response = HeaderMap::new();
/// response.insert("access-control-allow-origin", "https://evil.example".parse().unwrap());
/// cors.apply(&mut response);
///
/// assert_eq!(response["access-control-allow-methods"], "PUT");
/// assert_eq!(response["access-control-allow-headers"], "");
/// assert_eq!(response.get_all("access-control-allow-origin").iter().count(), 1);
/// assert_eq!(response["access-control-allow-origin"], "*");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsHeaders {
    allow_headers: HeaderValue,
    allow_methods: HeaderValue,
}

impl CorsHeaders {
    /// Derive the policy headers from the inbound request headers.
    ///
    /// `Access-Control-Request-Headers` and `Access-Control-Request-Method` are echoed
    /// verbatim; an absent header yields an empty value.
    #[must_use]
    pub fn from_request(headers: &HeaderMap) -> Self {
        let echo = |name: &HeaderName| {
            headers
                .get(name)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static(""))
        };

        Self {
            allow_headers: echo(&ACCESS_CONTROL_REQUEST_HEADERS),
            allow_methods: echo(&ACCESS_CONTROL_REQUEST_METHOD),
        }
    }

    /// The echoed `Access-Control-Allow-Headers` value.
    #[must_use]
    pub fn allow_headers(&self) -> &HeaderValue {
        &self.allow_headers
    }

    /// The echoed `Access-Control-Allow-Methods` value.
    #[must_use]
    pub fn allow_methods(&self) -> &HeaderValue {
        &self.allow_methods
    }

    /// Replace any CORS headers in `headers` with the canonical policy values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        strip_cors_headers(headers);

        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE));
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS),
        );
    }
}

/// Remove every value of the five policy-owned header names.
pub fn strip_cors_headers(headers: &mut HeaderMap) {
    for name in &CORS_RESPONSE_HEADERS {
        headers.remove(name);
    }
}
