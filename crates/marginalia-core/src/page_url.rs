//! Page identity for storage keys.

use url::Url;

/// Storage key for a page: scheme, host, port and path, without query or fragment.
///
/// Input that does not parse as an absolute URL is returned unchanged.
pub fn normalize_page_url(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let Some(host) = url.host_str() else {
        return raw.to_string();
    };
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// Whether `raw` should be allowed through a host filter such as `nytimes.com`.
pub fn host_matches(raw: &str, filter: &str) -> bool {
    Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.contains(filter)))
        .unwrap_or_else(|| raw.contains(filter))
}
