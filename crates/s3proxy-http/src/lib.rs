//! HTTP layer of the S3 proxy gateway.
//!
//! - **Service** ([`service`]): [`ProxyHttpService`], a `tower::Service` implementing the
//!   gateway's decision tree (trust-boundary check, liveness root, route match, CORS
//!   preflight, forwarding).
//! - **Upstream** ([`upstream`]): the [`Upstream`] seam and its production implementation
//!   [`ReqwestUpstream`], which streams request and response bodies through a pooled
//!   `reqwest::Client`.
//! - **Headers** ([`headers`]): hop-by-hop header hygiene shared by both directions.
//! - **Compression** ([`compression`]): the gzip predicate and layer wrapped around the
//!   service.
//! - **Body** ([`body`]): the type-erased body types flowing through the gateway.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> CompressionLayer<GzipPredicate> (tower-http)
//!     -> ProxyHttpService
//!       -> X-Forwarded-Proto check          (400)
//!       -> GET /                            (200 "S3 Proxy")
//!       -> parse_route                      (404)
//!       -> OPTIONS preflight                (200 + CORS)
//!       -> TargetBuilder + Upstream::forward (relay + CORS)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use s3proxy_http::compression::gzip_layer;
//! use s3proxy_http::service::{ProxyHttpConfig, ProxyHttpService};
//! use s3proxy_http::upstream::{ReqwestUpstream, UpstreamOptions};
//! use tower::ServiceBuilder;
//!
//! let upstream = ReqwestUpstream::new(&UpstreamOptions::default()).expect("client");
//! let service = ServiceBuilder::new()
//!     .layer(gzip_layer(1024))
//!     .service(ProxyHttpService::new(upstream, ProxyHttpConfig::default()));
//! // Serve `service` with hyper-util's `TowerToHyperService`.
//! ```

pub mod body;
pub mod compression;
pub mod headers;
pub mod service;
pub mod upstream;

pub use body::{BoxError, ForwardBody, ProxyBody};
pub use compression::{GzipPredicate, SkipCompression, gzip_layer};
pub use service::{ProxyHttpConfig, ProxyHttpService};
pub use upstream::{ReqwestUpstream, Upstream, UpstreamOptions};
