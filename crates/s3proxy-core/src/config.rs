//! Gateway configuration.
//!
//! Provides [`ProxyConfig`], loaded from environment variables at start-up. Everything
//! here is read-only once the server is running.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::target::DEFAULT_HOST_TEMPLATE;

/// S3 proxy gateway configuration.
///
/// # Examples
///
/// ```
/// use s3proxy_core::config::ProxyConfig;
///
/// let config = ProxyConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:8080");
/// assert_eq!(config.upstream_host_template, "{bucket}.s3.{region}.amazonaws.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Bind address for the gateway (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Upstream host template with `{region}` and `{bucket}` placeholders.
    #[builder(default = String::from(DEFAULT_HOST_TEMPLATE))]
    pub upstream_host_template: String,

    /// Upstream scheme, `https` or `http`.
    #[builder(default = String::from("https"))]
    pub upstream_scheme: String,

    /// Name of the trust-boundary header carrying the client's original protocol.
    #[builder(default = String::from("x-forwarded-proto"))]
    pub forwarded_proto_header: String,

    /// Upstream TCP/TLS connect timeout, in seconds.
    #[builder(default = 10)]
    pub upstream_connect_timeout_secs: u64,

    /// Maximum time between upstream reads, in seconds.
    #[builder(default = 60)]
    pub upstream_read_timeout_secs: u64,

    /// How long idle pooled upstream connections are kept, in seconds.
    #[builder(default = 90)]
    pub upstream_pool_idle_timeout_secs: u64,

    /// Smallest response body, in bytes, eligible for gzip.
    #[builder(default = 1024)]
    pub gzip_min_length: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Log output format, `text` or `json`.
    #[builder(default = String::from("text"))]
    pub log_format: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            gateway_listen: String::from("0.0.0.0:8080"),
            upstream_host_template: String::from(DEFAULT_HOST_TEMPLATE),
            upstream_scheme: String::from("https"),
            forwarded_proto_header: String::from("x-forwarded-proto"),
            upstream_connect_timeout_secs: 10,
            upstream_read_timeout_secs: 60,
            upstream_pool_idle_timeout_secs: 90,
            gzip_min_length: 1024,
            log_level: String::from("info"),
            log_format: String::from("text"),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `PORT` | *(unset; when set, binds `0.0.0.0:{PORT}`)* |
    /// | `UPSTREAM_HOST_TEMPLATE` | `{bucket}.s3.{region}.amazonaws.com` |
    /// | `UPSTREAM_SCHEME` | `https` |
    /// | `FORWARDED_PROTO_HEADER` | `x-forwarded-proto` |
    /// | `UPSTREAM_CONNECT_TIMEOUT_SECS` | `10` |
    /// | `UPSTREAM_READ_TIMEOUT_SECS` | `60` |
    /// | `UPSTREAM_POOL_IDLE_TIMEOUT_SECS` | `90` |
    /// | `GZIP_MIN_LENGTH` | `1024` |
    /// | `LOG_LEVEL` | `info` |
    /// | `LOG_FORMAT` | `text` |
    ///
    /// Unparseable numeric values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse::<u16>().ok()) {
            config.gateway_listen = format!("0.0.0.0:{port}");
        }
        if let Some(v) = lookup("UPSTREAM_HOST_TEMPLATE") {
            config.upstream_host_template = v;
        }
        if let Some(v) = lookup("UPSTREAM_SCHEME") {
            config.upstream_scheme = v;
        }
        if let Some(v) = lookup("FORWARDED_PROTO_HEADER") {
            config.forwarded_proto_header = v;
        }
        if let Some(n) = parse_u64(lookup("UPSTREAM_CONNECT_TIMEOUT_SECS")) {
            config.upstream_connect_timeout_secs = n;
        }
        if let Some(n) = parse_u64(lookup("UPSTREAM_READ_TIMEOUT_SECS")) {
            config.upstream_read_timeout_secs = n;
        }
        if let Some(n) = parse_u64(lookup("UPSTREAM_POOL_IDLE_TIMEOUT_SECS")) {
            config.upstream_pool_idle_timeout_secs = n;
        }
        if let Some(n) = parse_u64(lookup("GZIP_MIN_LENGTH")) {
            config.gzip_min_length = n;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            config.log_format = v;
        }

        config
    }

    /// Whether JSON log output was requested.
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

fn parse_u64(value: Option<String>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}
