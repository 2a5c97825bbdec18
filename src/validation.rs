//! Input checks for branding values (colors and links)

use url::Url;

/// Accepts exactly `#RRGGBB` with hex digits in either case
pub fn is_valid_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Accepts absolute `http://` or `https://` URLs with a non-empty host.
///
/// Parsing follows the WHATWG URL standard, so relative paths, other schemes
/// (`javascript:`, `data:`) and malformed hosts or ports are rejected.
pub fn is_valid_safe_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_accepts_six_digit_forms() {
        assert!(is_valid_hex_color("#1A2b3C"));
        assert!(is_valid_hex_color("#000000"));
        assert!(is_valid_hex_color("#ffffff"));
    }

    #[test]
    fn test_hex_color_rejects_malformed() {
        assert!(!is_valid_hex_color("1A2B3C"));
        assert!(!is_valid_hex_color("#FFF"));
        assert!(!is_valid_hex_color("#GGGGGG"));
        assert!(!is_valid_hex_color("#1234567"));
        assert!(!is_valid_hex_color(""));
    }

    #[test]
    fn test_safe_url_accepts_http_and_https() {
        assert!(is_valid_safe_url("https://example.com"));
        assert!(is_valid_safe_url("http://example.com/logo.png"));
        assert!(is_valid_safe_url("HTTPS://cdn.example.com:8443/a?b=c"));
    }

    #[test]
    fn test_safe_url_rejects_other_schemes_and_garbage() {
        assert!(!is_valid_safe_url("javascript:alert(1)"));
        assert!(!is_valid_safe_url("data:text/html;base64,AAAA"));
        assert!(!is_valid_safe_url("/relative/path"));
        assert!(!is_valid_safe_url("https://"));
        assert!(!is_valid_safe_url("https://exa mple.com"));
        assert!(!is_valid_safe_url("ftp://example.com"));
    }

    #[test]
    fn test_safe_url_rejects_malformed_hosts_and_ports() {
        assert!(!is_valid_safe_url("http://["));
        assert!(!is_valid_safe_url("https://exa<mple.com"));
        assert!(!is_valid_safe_url("http://host:abc"));
        assert!(!is_valid_safe_url("http://%"));
        assert!(!is_valid_safe_url("not a url"));
    }
}
