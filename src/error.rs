use thiserror::Error;

/// Errors surfaced by the scraping API.
///
/// All variants are terminal for the call that raised them; nothing in the
/// crate retries on the caller's behalf.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// General scraping error, including invalid configuration.
    #[error("{0}")]
    General(String),

    /// Network failure, timeout, or non-2xx response.
    #[error("request failed: {0}")]
    Request(String),

    /// Malformed selector, or a required selector/tag/class/id with no match.
    #[error("parsing failed: {0}")]
    Parsing(String),
}

impl ScrapeError {
    /// Build a `Request` error from an HTTP status, with a hint for the
    /// statuses scrapers run into most.
    pub fn from_status(status: u16, url: &str) -> Self {
        let detail = match status {
            403 => " (access denied, possibly bot protection)",
            404 => " (not found)",
            429 => " (rate limited by the server)",
            500..=599 => " (server error)",
            _ => "",
        };
        ScrapeError::Request(format!("HTTP {} for {}{}", status, url, detail))
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::Request(format!("request timed out: {}", err))
        } else {
            ScrapeError::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for ScrapeError {
    fn from(err: url::ParseError) -> Self {
        ScrapeError::General(format!("invalid URL: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mentions_url_and_status() {
        let err = ScrapeError::from_status(404, "https://example.com/missing");
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("https://example.com/missing"));
    }

    #[test]
    fn test_rate_limited_status_hint() {
        let err = ScrapeError::from_status(429, "https://example.com");
        assert!(err.to_string().contains("rate limited"));
    }
}
