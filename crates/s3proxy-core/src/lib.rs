//! Core building blocks for the S3 proxy gateway.
//!
//! Everything in this crate is request-scoped and performs no network I/O.
//!
//! - **Routing** ([`route`]): splits `/{region}/{bucket}/{key...}` request paths into a
//!   [`RouteMatch`], keeping the undecoded tail for byte-identical forwarding.
//! - **CORS** ([`cors`]): the fixed cross-origin policy applied to every proxied,
//!   short-circuited, or failed response on the proxy route.
//! - **Targets** ([`target`]): renders the configurable upstream host template into an
//!   absolute [`UpstreamTarget`] URI.
//! - **Configuration** ([`config`]): [`ProxyConfig`], loaded from environment variables.
//! - **Errors** ([`error`]): [`ProxyError`] and its HTTP status mapping.
//!
//! # Example
//!
//! ```
//! use s3proxy_core::route::parse_route;
//! use s3proxy_core::target::TargetBuilder;
//!
//! let route = parse_route("/us-east-1/my-bucket/dir/file.txt").expect("proxy route");
//! let target = TargetBuilder::default()
//!     .build(&route, Some("x=1"))
//!     .expect("valid target");
//! assert_eq!(
//!     target.uri().to_string(),
//!     "https://my-bucket.s3.us-east-1.amazonaws.com/dir/file.txt?x=1",
//! );
//! ```

pub mod config;
pub mod cors;
pub mod error;
pub mod route;
pub mod target;

pub use config::ProxyConfig;
pub use cors::CorsHeaders;
pub use error::{ConfigError, ProxyError};
pub use route::{RouteMatch, parse_route};
pub use target::{HostTemplate, TargetBuilder, UpstreamScheme, UpstreamTarget};
