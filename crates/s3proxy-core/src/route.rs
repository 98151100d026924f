//! URL segment parsing for `/{region}/{bucket}/{key...}` request paths.
//!
//! [`parse_route`] extracts the region and bucket from the first two path segments.
//! The remainder of the path is kept twice: once percent-decoded for diagnostics
//! ([`RouteMatch::object_path`]) and once exactly as received
//! ([`RouteMatch::raw_tail`]). Only the raw tail is ever forwarded upstream, so object
//! keys containing encoded characters such as `%2F` or `%20` reach the store unchanged.

use percent_encoding::percent_decode_str;

/// The result of matching a request path against the proxy route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// First path segment, as received.
    pub region: String,
    /// Second path segment, as received.
    pub bucket: String,
    /// Remaining segments joined with `/`, percent-decoded. May be empty.
    pub object_path: String,
    /// Undecoded suffix of the path after `/{region}/{bucket}`, starting with `/`
    /// when non-empty.
    pub raw_tail: String,
}

/// Match a raw request path (no query string) against `/{region}/{bucket}(/...)?`.
///
/// Returns `None` when the path has fewer than two segments or when either the region
/// or the bucket segment is empty.
///
/// # Examples
///
/// ```
/// use s3proxy_core::route::parse_route;
///
/// let route = parse_route("/eu-west-1/b1/a%20b/c").expect("matched");
/// assert_eq!(route.region, "eu-west-1");
/// assert_eq!(route.bucket, "b1");
/// assert_eq!(route.object_path, "a b/c");
/// assert_eq!(route.raw_tail, "/a%20b/c");
///
/// assert!(parse_route("/onlyone").is_none());
/// assert!(parse_route("/").is_none());
/// ```
#[must_use]
pub fn parse_route(path: &str) -> Option<RouteMatch> {
    let rest = path.strip_prefix('/')?;

    let (region, rest) = rest.split_once('/')?;
    let (bucket, raw_tail) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    if region.is_empty() || bucket.is_empty() {
        return None;
    }

    let object_path = raw_tail.strip_prefix('/').unwrap_or(raw_tail);
    let object_path = percent_decode_str(object_path)
        .decode_utf8_lossy()
        .into_owned();

    Some(RouteMatch {
        region: region.to_owned(),
        bucket: bucket.to_owned(),
        object_path,
        raw_tail: raw_tail.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_match_region_bucket_and_key() {
        let route = parse_route("/us-east-1/my-bucket/dir/file.txt").expect("matched");
        assert_eq!(route.region, "us-east-1");
        assert_eq!(route.bucket, "my-bucket");
        assert_eq!(route.object_path, "dir/file.txt");
        assert_eq!(route.raw_tail, "/dir/file.txt");
    }

    #[test]
    fn test_should_match_bucket_without_key() {
        let route = parse_route("/us-east-1/my-bucket").expect("matched");
        assert_eq!(route.object_path, "");
        assert_eq!(route.raw_tail, "");
    }

    #[test]
    fn test_should_keep_trailing_slash_in_raw_tail() {
        let route = parse_route("/us-east-1/my-bucket/").expect("matched");
        assert_eq!(route.object_path, "");
        assert_eq!(route.raw_tail, "/");
    }

    #[test]
    fn test_should_preserve_percent_encoding_in_raw_tail() {
        let route = parse_route("/r/b/a%2Fb/%E2%9C%93+x%20y").expect("matched");
        assert_eq!(route.raw_tail, "/a%2Fb/%E2%9C%93+x%20y");
        assert_eq!(route.object_path, "a/b/\u{2713}+x y");
    }

    #[test]
    fn test_should_preserve_empty_inner_segments() {
        let route = parse_route("/r/b//double//slash").expect("matched");
        assert_eq!(route.raw_tail, "//double//slash");
        assert_eq!(route.object_path, "/double//slash");
    }

    #[test]
    fn test_should_not_match_root() {
        assert!(parse_route("/").is_none());
    }

    #[test]
    fn test_should_not_match_single_segment() {
        assert!(parse_route("/onlyone").is_none());
        assert!(parse_route("/onlyone/").is_none());
    }

    #[test]
    fn test_should_not_match_empty_region_or_bucket() {
        assert!(parse_route("//bucket/key").is_none());
        assert!(parse_route("/region//key").is_none());
    }

    #[test]
    fn test_should_not_match_relative_path() {
        assert!(parse_route("region/bucket/key").is_none());
        assert!(parse_route("").is_none());
    }
}
