//! S3 Proxy Server - path-addressed reverse proxy in front of S3.
//!
//! Requests to `/{region}/{bucket}/{key...}` are forwarded to
//! `https://{bucket}.s3.{region}.amazonaws.com/{key...}` with a permissive CORS policy
//! applied to every response. `GET /` answers `S3 Proxy` for liveness probes.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:8080 s3proxy-server
//! s3proxy-server --health-check
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `PORT` | *(unset)* | Binds `0.0.0.0:{PORT}` when set |
//! | `UPSTREAM_HOST_TEMPLATE` | `{bucket}.s3.{region}.amazonaws.com` | Upstream host |
//! | `UPSTREAM_SCHEME` | `https` | `https` or `http` |
//! | `FORWARDED_PROTO_HEADER` | `x-forwarded-proto` | Trust-boundary header |
//! | `UPSTREAM_CONNECT_TIMEOUT_SECS` | `10` | Upstream connect timeout |
//! | `UPSTREAM_READ_TIMEOUT_SECS` | `60` | Upstream read timeout |
//! | `UPSTREAM_POOL_IDLE_TIMEOUT_SECS` | `90` | Idle pooled connection lifetime |
//! | `GZIP_MIN_LENGTH` | `1024` | Smallest body eligible for gzip |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use http::HeaderName;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::service::TowerToHyperService;
use s3proxy_core::config::ProxyConfig;
use s3proxy_core::error::ConfigError;
use s3proxy_core::target::{HostTemplate, TargetBuilder, UpstreamScheme};
use s3proxy_http::compression::gzip_layer;
use s3proxy_http::service::{ProxyHttpConfig, ProxyHttpService, ROOT_BODY};
use s3proxy_http::upstream::{ReqwestUpstream, UpstreamOptions};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at start-up.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Build the [`ProxyHttpConfig`] from the application [`ProxyConfig`].
fn build_http_config(config: &ProxyConfig) -> Result<ProxyHttpConfig> {
    let template = HostTemplate::parse(&config.upstream_host_template)
        .context("invalid UPSTREAM_HOST_TEMPLATE")?;
    let scheme: UpstreamScheme = config
        .upstream_scheme
        .parse()
        .context("invalid UPSTREAM_SCHEME")?;
    let forwarded_proto_header = HeaderName::try_from(config.forwarded_proto_header.as_str())
        .map_err(|_| ConfigError::InvalidHeaderName(config.forwarded_proto_header.clone()))
        .context("invalid FORWARDED_PROTO_HEADER")?;

    Ok(ProxyHttpConfig {
        targets: TargetBuilder::new(scheme, template),
        forwarded_proto_header,
    })
}

/// Build the upstream client settings from the application [`ProxyConfig`].
fn build_upstream_options(config: &ProxyConfig) -> UpstreamOptions {
    UpstreamOptions {
        connect_timeout: Duration::from_secs(config.upstream_connect_timeout_secs),
        read_timeout: Duration::from_secs(config.upstream_read_timeout_secs),
        pool_idle_timeout: Duration::from_secs(config.upstream_pool_idle_timeout_secs),
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, draining connections"),
        () = terminate => info!("received SIGTERM, draining connections"),
    }
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(
    listener: TcpListener,
    upstream: ReqwestUpstream,
    http_config: ProxyHttpConfig,
    gzip_min_length: u64,
) -> Result<()> {
    let service = ServiceBuilder::new()
        .layer(gzip_layer(gzip_min_length))
        .service(ProxyHttpService::new(upstream, http_config));

    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = TowerToHyperService::new(service.clone());
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Perform a health check by connecting to the gateway and requesting `/`.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET / HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if is_healthy_response(&response) {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

fn is_healthy_response(response: &str) -> bool {
    response.starts_with("HTTP/1.1 200") && response.contains(ROOT_BODY)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let config = ProxyConfig::from_env();
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = ProxyConfig::from_env();

    init_tracing(&config.log_level, config.json_logs())?;

    let http_config = build_http_config(&config)?;

    info!(
        gateway_listen = %config.gateway_listen,
        upstream_host_template = %http_config.targets.template(),
        upstream_scheme = %http_config.targets.scheme(),
        forwarded_proto_header = %http_config.forwarded_proto_header,
        gzip_min_length = config.gzip_min_length,
        version = VERSION,
        "starting S3 Proxy Server",
    );

    let upstream = ReqwestUpstream::new(&build_upstream_options(&config))
        .context("failed to build upstream client")?;

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, upstream, http_config, config.gzip_min_length).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_http_config_from_proxy_config() {
        let config = ProxyConfig::default();
        let http_config = build_http_config(&config).expect("default config is valid");

        assert_eq!(http_config.targets.scheme(), UpstreamScheme::Https);
        assert_eq!(
            http_config.targets.template().as_str(),
            "{bucket}.s3.{region}.amazonaws.com"
        );
        assert_eq!(http_config.forwarded_proto_header, "x-forwarded-proto");
        assert_eq!(
            http_config.targets.template().to_string(),
            config.upstream_host_template
        );
        assert_eq!(http_config.targets.scheme().to_string(), "https");
    }

    #[test]
    fn test_should_reject_invalid_proxy_config() {
        let bad_template = ProxyConfig::builder()
            .upstream_host_template("{bucket}.{zone}.example.net".into())
            .build();
        assert!(build_http_config(&bad_template).is_err());

        let bad_scheme = ProxyConfig::builder().upstream_scheme("ftp".into()).build();
        assert!(build_http_config(&bad_scheme).is_err());

        let bad_header = ProxyConfig::builder()
            .forwarded_proto_header("not a header".into())
            .build();
        assert!(build_http_config(&bad_header).is_err());
    }

    #[test]
    fn test_should_build_upstream_options_from_proxy_config() {
        let config = ProxyConfig::builder()
            .upstream_connect_timeout_secs(2)
            .upstream_read_timeout_secs(30)
            .upstream_pool_idle_timeout_secs(5)
            .build();
        let options = build_upstream_options(&config);

        assert_eq!(options.connect_timeout, Duration::from_secs(2));
        assert_eq!(options.read_timeout, Duration::from_secs(30));
        assert_eq!(options.pool_idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_should_recognise_healthy_response() {
        let ok = "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 8\r\n\r\nS3 Proxy";
        assert!(is_healthy_response(ok));

        let not_found = "HTTP/1.1 404 Not Found\r\n\r\nNot Found";
        assert!(!is_healthy_response(not_found));

        let wrong_body = "HTTP/1.1 200 OK\r\n\r\nsomething else";
        assert!(!is_healthy_response(wrong_body));
    }

    #[tokio::test]
    async fn test_should_fail_health_check_when_nothing_listens() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        assert!(run_health_check(&addr.to_string()).await.is_err());
    }
}
