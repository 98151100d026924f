//! Error types for the S3 proxy gateway.
//!
//! [`ProxyError`] covers every terminal, per-request failure and maps each to the HTTP
//! status returned to the client. [`ConfigError`] covers start-up configuration problems.
//!
//! ```
//! use http::StatusCode;
//! use s3proxy_core::error::ProxyError;
//!
//! assert_eq!(ProxyError::ProtocolViolation.status_code(), StatusCode::BAD_REQUEST);
//! assert_eq!(ProxyError::RouteNotMatched.status_code(), StatusCode::NOT_FOUND);
//! ```

use http::StatusCode;

/// A terminal failure while handling a single request.
///
/// None of these are retried by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The forwarded-protocol header carried the disallowed value, meaning the request
    /// reached the gateway without passing through the TLS-terminating layer.
    #[error("request arrived over a disallowed forwarded protocol")]
    ProtocolViolation,

    /// The path has fewer than two non-empty segments and is not the root path.
    #[error("request path does not match /{{region}}/{{bucket}}")]
    RouteNotMatched,

    /// The region or bucket cannot be rendered into a valid upstream URI.
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),

    /// The upstream could not be reached or failed at the transport level.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The upstream did not answer within the configured timeout.
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),
}

impl ProxyError {
    /// The HTTP status returned to the client for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProtocolViolation | Self::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            Self::RouteNotMatched => StatusCode::NOT_FOUND,
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// Invalid gateway configuration, detected at start-up.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The upstream host template is malformed.
    #[error("invalid host template {template:?}: {reason}")]
    InvalidHostTemplate {
        /// The template as configured.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The upstream scheme is neither `http` nor `https`.
    #[error("unsupported upstream scheme: {0}")]
    UnsupportedScheme(String),

    /// The forwarded-protocol header name is not a valid HTTP header name.
    #[error("invalid forwarded-protocol header name: {0}")]
    InvalidHeaderName(String),
}
