use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/v\d+(beta\d*)?/?$").unwrap());

/// Picks the configured base URL or `default`, without a trailing slash.
pub fn resolve_base_url(configured: &str, default: &str) -> String {
    let trimmed = configured.trim();
    let raw = if trimmed.is_empty() { default } else { trimmed };
    raw.trim_end_matches('/').to_string()
}

/// Normalises a base URL for an OpenAI-compatible API: appends `/v1` unless
/// a version segment is already present. A trailing `#` means "use as is".
pub fn ensure_openai_base_url_has_v1(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Some(verbatim) = trimmed.strip_suffix('#') {
        return verbatim.trim_end_matches('/').to_string();
    }

    let without_slash = trimmed.trim_end_matches('/');
    if VERSION_SUFFIX_RE.is_match(without_slash) || without_slash.contains("/v1/") {
        without_slash.to_string()
    } else {
        format!("{}/v1", without_slash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_configured_value() {
        assert_eq!(
            resolve_base_url(" http://127.0.0.1:9000/ ", "https://api.openai.com/v1"),
            "http://127.0.0.1:9000"
        );
        assert_eq!(
            resolve_base_url("", "https://api.openai.com/v1"),
            "https://api.openai.com/v1"
        );
    }

    #[test]
    fn appends_v1_when_missing() {
        assert_eq!(
            ensure_openai_base_url_has_v1("https://example.com"),
            "https://example.com/v1"
        );
    }

    #[test]
    fn keeps_existing_version() {
        assert_eq!(
            ensure_openai_base_url_has_v1("https://api.groq.com/openai/v1/"),
            "https://api.groq.com/openai/v1"
        );
        assert_eq!(
            ensure_openai_base_url_has_v1("https://example.com/v1beta"),
            "https://example.com/v1beta"
        );
    }

    #[test]
    fn respects_hash_suffix() {
        assert_eq!(
            ensure_openai_base_url_has_v1("https://proxy.local/openai#"),
            "https://proxy.local/openai"
        );
    }
}
