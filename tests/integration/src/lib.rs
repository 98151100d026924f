//! Integration tests for a running S3 proxy gateway.
//!
//! These tests require a gateway at `GATEWAY_URL` (default `http://localhost:8080`).
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p s3proxy-integration -- --ignored
//! ```
//!
//! Only locally answered paths are exercised, so no AWS credentials or network access
//! beyond the gateway are needed.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Base URL of the gateway under test.
#[must_use]
pub fn gateway_url() -> String {
    std::env::var("GATEWAY_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_owned())
        .trim_end_matches('/')
        .to_owned()
}

/// Create an HTTP client for the gateway.
#[must_use]
pub fn client() -> reqwest::Client {
    init_tracing();
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build reqwest client")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORS_HEADERS: [&str; 5] = [
        "access-control-allow-origin",
        "access-control-allow-methods",
        "access-control-allow-headers",
        "access-control-max-age",
        "access-control-expose-headers",
    ];

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_answer_root() {
        let resp = client()
            .get(format!("{}/", gateway_url()))
            .send()
            .await
            .expect("GET /");

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/plain");
        assert_eq!(resp.text().await.expect("body"), "S3 Proxy");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_answer_preflight() {
        let resp = client()
            .request(
                reqwest::Method::OPTIONS,
                format!("{}/eu-west-1/b1/k", gateway_url()),
            )
            .header("origin", "https://app.example")
            .header("access-control-request-method", "PUT")
            .header("access-control-request-headers", "content-type,x-amz-meta-helium")
            .send()
            .await
            .expect("OPTIONS preflight");

        assert_eq!(resp.status(), 200);
        for name in CORS_HEADERS {
            assert_eq!(resp.headers().get_all(name).iter().count(), 1, "{name}");
        }
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(resp.headers()["access-control-allow-methods"], "PUT");
        assert_eq!(
            resp.headers()["access-control-allow-headers"],
            "content-type,x-amz-meta-helium"
        );
        assert_eq!(resp.headers()["access-control-max-age"], "3000");
        assert!(resp.bytes().await.expect("body").is_empty());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_not_found_for_single_segment() {
        let resp = client()
            .get(format!("{}/onlyone", gateway_url()))
            .send()
            .await
            .expect("GET /onlyone");

        assert_eq!(resp.status(), 404);
        assert_eq!(resp.text().await.expect("body"), "Not Found");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_plain_http_forwarded_proto() {
        for path in ["/", "/us-east-1/my-bucket/key"] {
            let resp = client()
                .get(format!("{}{path}", gateway_url()))
                .header("x-forwarded-proto", "http")
                .send()
                .await
                .expect("request");
            assert_eq!(resp.status(), 400, "{path}");
        }
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_serve_concurrent_requests() {
        let client = client();
        let url = gateway_url();

        let responses = futures::future::join_all((0..32).map(|i| {
            let client = client.clone();
            let url = format!("{url}/region-{i}/bucket-{i}/k");
            async move {
                client
                    .request(reqwest::Method::OPTIONS, url)
                    .header("access-control-request-method", "GET")
                    .send()
                    .await
            }
        }))
        .await;

        for resp in responses {
            let resp = resp.expect("request");
            assert_eq!(resp.status(), 200);
            assert_eq!(resp.headers()["access-control-allow-methods"], "GET");
        }
    }
}
