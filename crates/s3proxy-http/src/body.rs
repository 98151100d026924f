//! Type-erased body types used by the gateway.
//!
//! Both directions stream: [`ForwardBody`] carries the inbound request body to the
//! upstream and [`ProxyBody`] carries the upstream (or locally generated) response body
//! back to the client. Neither is ever collected in memory by the gateway.

use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};

/// Boxed error used at body and transport boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body returned to the client.
pub type ProxyBody = UnsyncBoxBody<Bytes, io::Error>;

/// Request body sent to the upstream.
pub type ForwardBody = UnsyncBoxBody<Bytes, BoxError>;

/// An empty response body.
#[must_use]
pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// A buffered response body.
#[must_use]
pub fn full(data: impl Into<Bytes>) -> ProxyBody {
    Full::new(data.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}
