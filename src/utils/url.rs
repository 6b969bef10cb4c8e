// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative href against a base URL.
///
/// Returns `None` when the href cannot be joined (e.g. a malformed host).
///
/// # Examples
/// ```
/// use url::Url;
/// use webharvest::utils::url::resolve;
///
/// let base = Url::parse("https://example.com/path/").unwrap();
/// assert_eq!(
///     resolve(&base, "page.html").unwrap().as_str(),
///     "https://example.com/path/page.html"
/// );
/// ```
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Whether the URL can be fetched over HTTP.
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Whether both URLs point at the same host.
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
}

/// Final path segment of a URL, used as the on-disk file name.
///
/// Falls back to `index.html` for directory-like URLs.
pub fn basename(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .unwrap_or_else(|| "index.html".to_string())
}
