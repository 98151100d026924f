//! Upstream forwarding.
//!
//! [`Upstream`] is the boundary between the gateway's routing logic and the network.
//! The gateway hands it a fully rewritten request (absolute upstream URI, hygienic
//! headers, streaming body) and relays whatever response comes back.
//!
//! [`ReqwestUpstream`] is the production implementation. It shares one pooled
//! `reqwest::Client` across all requests, never follows redirects, and never retries.
//! Dropping the returned future or response body aborts the upstream exchange, which is
//! how client disconnects propagate.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;
use s3proxy_core::error::ProxyError;

use crate::body::{ForwardBody, ProxyBody};

/// Future returned by [`Upstream::forward`].
pub type UpstreamFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<ProxyBody>, ProxyError>> + Send>>;

/// A backend that rewritten requests are forwarded to.
///
/// Implementations must be safe to share across concurrent, unrelated requests.
pub trait Upstream: Send + Sync + 'static {
    /// Perform exactly one upstream exchange for `req`.
    ///
    /// The request URI is absolute. Transport failures are reported as
    /// [`ProxyError::UpstreamUnreachable`] or [`ProxyError::UpstreamTimeout`]; any HTTP
    /// response, whatever its status, is returned as `Ok`.
    fn forward(&self, req: http::Request<ForwardBody>) -> UpstreamFuture;
}

/// Connection settings for [`ReqwestUpstream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamOptions {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Maximum idle time between reads of the upstream response.
    pub read_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// [`Upstream`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    /// Build the client from `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(options: &UpstreamOptions) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .pool_idle_timeout(options.pool_idle_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Upstream for ReqwestUpstream {
    fn forward(&self, req: http::Request<ForwardBody>) -> UpstreamFuture {
        let client = self.client.clone();
        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            // The inbound hop may be HTTP/2; let the client negotiate its own.
            parts.version = http::Version::default();

            let body = if body.is_end_stream() {
                reqwest::Body::from(Bytes::new())
            } else {
                reqwest::Body::wrap_stream(body.into_data_stream())
            };

            let request = reqwest::Request::try_from(http::Request::from_parts(parts, body))
                .map_err(classify_error)?;
            let response = client.execute(request).await.map_err(classify_error)?;

            let response: http::Response<reqwest::Body> = response.into();
            Ok(response.map(|body| body.map_err(io::Error::other).boxed_unsync()))
        })
    }
}

fn classify_error(err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamTimeout(err.to_string())
    } else if err.is_builder() {
        ProxyError::InvalidTarget(err.to_string())
    } else {
        ProxyError::UpstreamUnreachable(err.to_string())
    }
}
