// src/backend/utils/play_store.rs
// App identity is the Android package name taken from the Play Store listing URL.

use url::Url;

const PLAY_STORE_HOST: &str = "play.google.com";

/// Extracts the package name (`id` query parameter) from a Play Store URL.
pub fn extract_package_name(play_store_url: &str) -> Option<String> {
    let url = Url::parse(play_store_url.trim()).ok()?;
    if !matches!(url.scheme(), "https" | "http") || url.host_str() != Some(PLAY_STORE_HOST) {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| is_valid_package_name(id))
}

/// Reverse-domain notation: at least two segments, each starting with a letter.
pub fn is_valid_package_name(id: &str) -> bool {
    id.split('.').count() >= 2
        && id.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
