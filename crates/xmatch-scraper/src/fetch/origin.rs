//! URL helpers for resolving listing links against the page they came from.

/// Extracts the hostname from a page URL for use in error messages.
///
/// Falls back to the full URL string if parsing fails.
#[must_use]
pub fn extract_domain(page_url: &str) -> String {
    reqwest::Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| page_url.to_owned())
}

/// Resolves `href` against `page_url`.
///
/// Absolute links are returned unchanged, protocol-relative (`//host/...`)
/// and path-relative links are joined onto the page URL. Returns `None` for
/// empty, fragment-only and `javascript:` links, or when the page URL itself
/// cannot be parsed and the link is not absolute.
#[must_use]
pub fn resolve_link(href: &str, page_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    if let Ok(absolute) = reqwest::Url::parse(href) {
        return Some(absolute.to_string());
    }

    let base = reqwest::Url::parse(page_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}
