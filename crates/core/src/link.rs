//! Link normalization against a page's base address.

use url::Url;

use crate::{FeedgenError, Result};

/// Rewrites an `href` value into an absolute link.
///
/// - `./path` becomes `<base>/path`
/// - `/path` becomes `<scheme>://<host>/path`, taken from `base`
/// - `//host/path` and `http(s)://...` are returned unchanged
/// - anything else is joined to `base` with a `/`
///
/// A trailing `/` on `base` is not doubled.
///
/// # Errors
///
/// Returns [`FeedgenError::InvalidUrl`] when a root-relative link needs the
/// host of a `base` that is not a valid absolute URL.
///
/// # Example
///
/// ```rust
/// use feedgen_core::normalize_link;
///
/// let link = normalize_link("https://example.com/blog", "/about").unwrap();
/// assert_eq!(link, "https://example.com/about");
/// ```
pub fn normalize_link(base: &str, link: &str) -> Result<String> {
    let trimmed_base = base.trim_end_matches('/');

    if let Some(rest) = link.strip_prefix("./") {
        return Ok(format!("{}/{}", trimmed_base, rest));
    }

    if link.starts_with("//") || has_http_scheme(link) {
        return Ok(link.to_string());
    }

    if link.starts_with('/') {
        let url = Url::parse(base).map_err(|e| FeedgenError::InvalidUrl(format!("{}: {}", base, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| FeedgenError::InvalidUrl(format!("{}: base address has no host", base)))?;

        return Ok(match url.port() {
            Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, link),
            None => format!("{}://{}{}", url.scheme(), host, link),
        });
    }

    Ok(format!("{}/{}", trimmed_base, link))
}

fn has_http_scheme(link: &str) -> bool {
    let starts_with = |prefix: &str| link.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix));
    starts_with("http://") || starts_with("https://")
}
