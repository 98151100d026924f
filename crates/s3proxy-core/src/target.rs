//! Upstream target construction.
//!
//! The upstream host is rendered from a [`HostTemplate`] such as
//! `{bucket}.s3.{region}.amazonaws.com` (AWS virtual-hosted addressing, the default).
//! The path is the route's raw tail and the query string is appended verbatim, so the
//! upstream sees exactly the bytes the client sent after `/{region}/{bucket}`.

use std::fmt;
use std::str::FromStr;

use http::Uri;

use crate::error::{ConfigError, ProxyError};
use crate::route::RouteMatch;

/// Default upstream host template: AWS S3 region-specific virtual-hosted addressing.
pub const DEFAULT_HOST_TEMPLATE: &str = "{bucket}.s3.{region}.amazonaws.com";

// ---------------------------------------------------------------------------
// UpstreamScheme
// ---------------------------------------------------------------------------

/// Scheme used to reach the upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpstreamScheme {
    /// Plain HTTP, for local S3-compatible stores.
    Http,
    /// HTTPS.
    #[default]
    Https,
}

impl UpstreamScheme {
    /// The scheme as it appears in a URI.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for UpstreamScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpstreamScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("https") {
            Ok(Self::Https)
        } else if s.eq_ignore_ascii_case("http") {
            Ok(Self::Http)
        } else {
            Err(ConfigError::UnsupportedScheme(s.to_owned()))
        }
    }
}

// ---------------------------------------------------------------------------
// HostTemplate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Region,
    Bucket,
}

/// A parsed upstream host template with `{region}` and `{bucket}` placeholders.
///
/// # Examples
///
/// ```
/// use s3proxy_core::target::HostTemplate;
///
/// let template: HostTemplate = "{bucket}.storage.{region}.example.net".parse().unwrap();
/// assert_eq!(template.render("eu-1", "media"), "media.storage.eu-1.example.net");
///
/// assert!("{bucket}.{zone}.example.net".parse::<HostTemplate>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl HostTemplate {
    /// Parse a template, accepting only the `{region}` and `{bucket}` placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostTemplate`] for an empty template, an unknown
    /// placeholder, or unbalanced braces.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidHostTemplate {
            template: template.to_owned(),
            reason: reason.to_owned(),
        };

        if template.trim().is_empty() {
            return Err(invalid("template is empty"));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(idx) = rest.find(['{', '}']) {
            let (before, tail) = rest.split_at(idx);
            literal.push_str(before);

            if tail.starts_with('}') {
                return Err(invalid("unbalanced '}'"));
            }

            let Some(end) = tail.find('}') else {
                return Err(invalid("unclosed '{'"));
            };
            let placeholder = match &tail[1..end] {
                "region" => Segment::Region,
                "bucket" => Segment::Bucket,
                other => return Err(invalid(&format!("unknown placeholder {{{other}}}"))),
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(placeholder);
            rest = &tail[end + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: template.to_owned(),
            segments,
        })
    }

    /// Substitute the placeholders.
    #[must_use]
    pub fn render(&self, region: &str, bucket: &str) -> String {
        let mut host = String::with_capacity(self.raw.len() + region.len() + bucket.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => host.push_str(s),
                Segment::Region => host.push_str(region),
                Segment::Bucket => host.push_str(bucket),
            }
        }
        host
    }

    /// The template as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for HostTemplate {
    fn default() -> Self {
        Self {
            raw: DEFAULT_HOST_TEMPLATE.to_owned(),
            segments: vec![
                Segment::Bucket,
                Segment::Literal(".s3.".to_owned()),
                Segment::Region,
                Segment::Literal(".amazonaws.com".to_owned()),
            ],
        }
    }
}

impl FromStr for HostTemplate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HostTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// UpstreamTarget
// ---------------------------------------------------------------------------

/// The absolute upstream URI a single request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    uri: Uri,
}

impl UpstreamTarget {
    /// The absolute URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Consume the target, returning the URI.
    #[must_use]
    pub fn into_uri(self) -> Uri {
        self.uri
    }

    /// The rendered upstream host (including a port, if the template has one).
    #[must_use]
    pub fn authority(&self) -> &str {
        self.uri.authority().map_or("", http::uri::Authority::as_str)
    }
}

// ---------------------------------------------------------------------------
// TargetBuilder
// ---------------------------------------------------------------------------

/// Builds [`UpstreamTarget`]s from route matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetBuilder {
    scheme: UpstreamScheme,
    template: HostTemplate,
}

impl TargetBuilder {
    /// Create a builder from a scheme and host template.
    #[must_use]
    pub fn new(scheme: UpstreamScheme, template: HostTemplate) -> Self {
        Self { scheme, template }
    }

    /// The configured scheme.
    #[must_use]
    pub fn scheme(&self) -> UpstreamScheme {
        self.scheme
    }

    /// The configured host template.
    #[must_use]
    pub fn template(&self) -> &HostTemplate {
        &self.template
    }

    /// Build the upstream URI for `route`, appending `query` verbatim when present.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidTarget`] when the region or bucket contains
    /// characters that are not valid in a host name, or the result is not a valid URI.
    pub fn build(
        &self,
        route: &RouteMatch,
        query: Option<&str>,
    ) -> Result<UpstreamTarget, ProxyError> {
        for (what, label) in [("region", &route.region), ("bucket", &route.bucket)] {
            if !is_host_label(label) {
                return Err(ProxyError::InvalidTarget(format!("{what} {label:?}")));
            }
        }

        let host = self.template.render(&route.region, &route.bucket);
        let path = if route.raw_tail.is_empty() {
            "/"
        } else {
            route.raw_tail.as_str()
        };

        let mut target = format!("{}://{host}{path}", self.scheme);
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }

        let uri = Uri::try_from(target.as_str())
            .map_err(|e| ProxyError::InvalidTarget(format!("{target}: {e}")))?;

        Ok(UpstreamTarget { uri })
    }
}

/// Region and bucket segments end up in the upstream host; keep them to characters
/// that cannot change which host is addressed.
fn is_host_label(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'))
}
