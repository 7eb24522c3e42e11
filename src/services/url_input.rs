//! Address-bar input handling.

use url::form_urlencoded;
use url::Url;

/// Title shown for a tab whose URL has no host.
pub const NEW_TAB_LABEL: &str = "New Tab";

/// Turns address-bar input into a loadable URL.
///
/// Input containing a dot and no space is treated as an address (gaining
/// `https://` unless it already has an http(s) scheme); anything else becomes
/// a search query appended to `search_prefix`. Blank input yields `None`.
pub fn normalize_input(input: &str, search_prefix: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let looks_like_url = trimmed.contains('.') && !trimmed.contains(' ');
    if looks_like_url {
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Some(trimmed.to_string())
        } else {
            Some(format!("https://{trimmed}"))
        }
    } else {
        let query: String = form_urlencoded::byte_serialize(trimmed.as_bytes()).collect();
        Some(format!("{search_prefix}{query}"))
    }
}

/// Host of `url` without a leading `www.`, or [`NEW_TAB_LABEL`].
pub fn display_host(url: &str) -> String {
    match Url::parse(url).ok().as_ref().and_then(Url::host_str) {
        Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
        None => NEW_TAB_LABEL.to_string(),
    }
}
