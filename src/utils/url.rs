//! Endpoint URL helpers.
//!
//! Base URLs come from defaults or from user configuration, with or without
//! trailing slashes. Everything that builds a provider URL goes through here.

/// Strip trailing slashes from a base URL.
///
/// ```
/// use confab::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.deepseek.com/"), "https://api.deepseek.com");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash.
///
/// ```
/// use confab::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.anthropic.com/v1/", "/messages"),
///     "https://api.anthropic.com/v1/messages"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

/// Add a `name=value` query parameter, keeping any query already present.
/// Values are used verbatim; API keys and model ids need no escaping.
pub fn append_query(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{name}={value}")
}
