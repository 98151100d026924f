//! The gateway service implementing `tower::Service`.
//!
//! [`ProxyHttpService`] is the gateway router. Every request runs through one ordered
//! chain of checks:
//!
//! 1. Forwarded-protocol header equal to `http` is rejected (`400`)
//! 2. The root path `/` answers the liveness probe (`200 S3 Proxy`)
//! 3. Paths not shaped like `/{region}/{bucket}...` are `404`
//! 4. `OPTIONS` on a matched route is answered locally as a CORS preflight
//! 5. Everything else is forwarded upstream and relayed with CORS applied

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use s3proxy_core::cors::CorsHeaders;
use s3proxy_core::error::ProxyError;
use s3proxy_core::route::{RouteMatch, parse_route};
use s3proxy_core::target::TargetBuilder;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::body::{self, BoxError, ForwardBody, ProxyBody};
use crate::compression::SkipCompression;
use crate::headers::strip_hop_by_hop;
use crate::upstream::Upstream;

/// Body of the liveness response at `/`.
pub const ROOT_BODY: &str = "S3 Proxy";

/// Configuration for the gateway service.
#[derive(Debug, Clone)]
pub struct ProxyHttpConfig {
    /// Builds upstream URIs from matched routes.
    pub targets: TargetBuilder,
    /// Trust-boundary header carrying the client's original protocol.
    pub forwarded_proto_header: HeaderName,
}

impl Default for ProxyHttpConfig {
    fn default() -> Self {
        Self {
            targets: TargetBuilder::default(),
            forwarded_proto_header: HeaderName::from_static("x-forwarded-proto"),
        }
    }
}

/// The gateway service.
///
/// # Type Parameters
///
/// - `U`: the backend requests are forwarded to, see [`Upstream`].
#[derive(Debug)]
pub struct ProxyHttpService<U: Upstream> {
    upstream: Arc<U>,
    config: Arc<ProxyHttpConfig>,
}

impl<U: Upstream> ProxyHttpService<U> {
    /// Create a new gateway service.
    #[must_use]
    pub fn new(upstream: U, config: ProxyHttpConfig) -> Self {
        Self {
            upstream: Arc::new(upstream),
            config: Arc::new(config),
        }
    }
}

impl<U: Upstream> Clone for ProxyHttpService<U> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            config: Arc::clone(&self.config),
        }
    }
}

impl<U, B> tower::Service<http::Request<B>> for ProxyHttpService<U>
where
    U: Upstream,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = http::Response<ProxyBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let upstream = Arc::clone(&self.upstream);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            Ok(process_request(req, upstream.as_ref(), &config, &request_id).await)
        })
    }
}

/// Run one request through the gateway's decision chain.
async fn process_request<U, B>(
    req: http::Request<B>,
    upstream: &U,
    config: &ProxyHttpConfig,
    request_id: &str,
) -> http::Response<ProxyBody>
where
    U: Upstream,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing request");

    // 1. Trust boundary.
    if is_plain_http(req.headers(), &config.forwarded_proto_header) {
        warn!(%method, %uri, request_id, "rejected request forwarded over plain http");
        return error_response(&ProxyError::ProtocolViolation);
    }

    // 2. Liveness.
    if uri.path() == "/" {
        return root_response();
    }

    // 3. Route.
    let Some(route) = parse_route(uri.path()) else {
        debug!(%method, %uri, request_id, "no route matched");
        return error_response(&ProxyError::RouteNotMatched);
    };

    let cors = CorsHeaders::from_request(req.headers());

    // 4. Preflight.
    if method == Method::OPTIONS {
        debug!(
            region = %route.region,
            bucket = %route.bucket,
            request_id,
            "answered preflight"
        );
        return preflight_response(&cors);
    }

    // 5. Forward.
    let started = Instant::now();
    let mut response = match forward(req, &route, upstream, &config.targets, request_id).await {
        Ok(response) => {
            info!(
                %method,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis(),
                region = %route.region,
                bucket = %route.bucket,
                key = %route.object_path,
                request_id,
                "proxied request"
            );
            response
        }
        Err(err) => {
            warn!(
                %method,
                status = err.status_code().as_u16(),
                elapsed_ms = started.elapsed().as_millis(),
                region = %route.region,
                bucket = %route.bucket,
                key = %route.object_path,
                error = %err,
                request_id,
                "proxy request failed"
            );
            error_response(&err)
        }
    };

    cors.apply(response.headers_mut());
    if method == Method::HEAD {
        response.extensions_mut().insert(SkipCompression);
    }
    response
}

/// Rewrite `req` for the upstream, perform the exchange, and clean up the response.
async fn forward<U, B>(
    req: http::Request<B>,
    route: &RouteMatch,
    upstream: &U,
    targets: &TargetBuilder,
    request_id: &str,
) -> Result<http::Response<ProxyBody>, ProxyError>
where
    U: Upstream,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let target = targets.build(route, req.uri().query())?;
    debug!(upstream = %target.authority(), request_id, "forwarding request");

    let (mut parts, body) = req.into_parts();
    parts.uri = target.into_uri();
    parts.headers.remove(HOST);
    strip_hop_by_hop(&mut parts.headers);

    let body: ForwardBody = body.map_err(Into::<BoxError>::into).boxed_unsync();
    let mut response = upstream
        .forward(http::Request::from_parts(parts, body))
        .await?;

    strip_hop_by_hop(response.headers_mut());
    Ok(response)
}

/// Whether any value of the trust-boundary header starts with the `http` token.
///
/// A chained value such as `http, https` records the client-facing hop first, so only the
/// first comma-separated token of each value is compared.
fn is_plain_http(headers: &http::HeaderMap, name: &HeaderName) -> bool {
    headers.get_all(name).iter().any(|value| {
        value
            .as_bytes()
            .split(|b| *b == b',')
            .next()
            .is_some_and(|token| token.trim_ascii().eq_ignore_ascii_case(b"http"))
    })
}

fn root_response() -> http::Response<ProxyBody> {
    http::Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .body(body::full(ROOT_BODY))
        .expect("static root response should be valid")
}

fn preflight_response(cors: &CorsHeaders) -> http::Response<ProxyBody> {
    let mut response = http::Response::new(body::empty());
    cors.apply(response.headers_mut());
    response
}

fn error_response(err: &ProxyError) -> http::Response<ProxyBody> {
    let status = err.status_code();
    let reason = status.canonical_reason().unwrap_or("Error");
    http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .body(body::full(reason))
        .expect("static error response should be valid")
}
