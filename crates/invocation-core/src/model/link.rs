/// Normalise a user-entered link to `https://`
///
/// An `https://` link is returned unchanged, `http://` is upgraded, and
/// anything else is prefixed.
///
/// ```
/// use invocation_core::normalize_link;
///
/// assert_eq!(normalize_link("http://example.com"), "https://example.com");
/// assert_eq!(normalize_link("example.com/a"), "https://example.com/a");
/// ```
pub fn normalize_link(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix("http://") {
        return format!("https://{}", rest);
    }
    format!("https://{}", url)
}
