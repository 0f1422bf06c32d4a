use rand::Rng;
use url::Url;

/// User agent rotation for avoiding detection
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

pub fn get_random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    let index = rng.random_range(0..USER_AGENTS.len());
    USER_AGENTS[index]
}

/// Resolve a possibly relative URL against a base page URL.
/// Returns None when the URL cannot be made absolute.
pub fn normalize_url(base: &Url, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else if href.starts_with("//") {
        Some(format!("{}:{}", base.scheme(), href))
    } else {
        base.join(href).ok().map(|u| u.to_string())
    }
}

/// True when the URL points at a different host than the base page.
pub fn is_external(base: &Url, absolute: &str) -> bool {
    match Url::parse(absolute) {
        Ok(link) => base.host() != link.host(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent() {
        let agent = get_random_user_agent();
        assert!(!agent.is_empty());
        assert!(USER_AGENTS.contains(&agent));
    }

    #[test]
    fn test_normalize_url_absolute() {
        let base = Url::parse("https://example.com/list").unwrap();
        assert_eq!(
            normalize_url(&base, "https://other.com/p"),
            Some("https://other.com/p".to_string())
        );
    }

    #[test]
    fn test_normalize_url_relative_and_rooted() {
        let base = Url::parse("https://example.com/a/b.html").unwrap();
        assert_eq!(
            normalize_url(&base, "c.html"),
            Some("https://example.com/a/c.html".to_string())
        );
        assert_eq!(
            normalize_url(&base, "/images/x.png"),
            Some("https://example.com/images/x.png".to_string())
        );
    }

    #[test]
    fn test_normalize_url_protocol_relative() {
        let base = Url::parse("https://example.com").unwrap();
        assert_eq!(
            normalize_url(&base, "//cdn.example.com/app.js"),
            Some("https://cdn.example.com/app.js".to_string())
        );
    }

    #[test]
    fn test_is_external() {
        let base = Url::parse("https://example.com/page").unwrap();
        assert!(is_external(&base, "https://other.com/x"));
        assert!(!is_external(&base, "https://example.com/y"));
    }
}
