use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Constructor-level options shared by both scrapers.
///
/// Everything is optional; the defaults here match what `Default` produces,
/// so a config can come from JSON with any subset of fields set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Extra request headers sent with every fetch.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Charset hint used when a response does not declare its encoding.
    #[serde(default)]
    pub encoding: Option<String>,

    /// Permitted request rate; the fetch gate spaces requests at
    /// `1 / requests_per_second` seconds apart.
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: f64,

    /// Initial proxy endpoints, rotated round-robin.
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Run the browser without a visible window.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Browser executable. When unset, well-known install locations and
    /// `PATH` are searched.
    #[serde(default)]
    pub browser_path: Option<PathBuf>,

    /// Request and page-load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_rate_limit() -> f64 {
    2.0
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            encoding: None,
            requests_per_second: default_rate_limit(),
            proxies: Vec::new(),
            headless: default_headless(),
            browser_path: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ScraperConfig::default();
        assert_eq!(config.requests_per_second, 2.0);
        assert!(config.headless);
        assert!(config.proxies.is_empty());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{
            "requests_per_second": 0.5,
            "proxies": ["http://127.0.0.1:8080"],
            "headers": {"Accept-Language": "sv-SE"}
        }"#;

        let config: ScraperConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.requests_per_second, 0.5);
        assert_eq!(config.proxies.len(), 1);
        assert_eq!(
            config.headers.get("Accept-Language").map(String::as_str),
            Some("sv-SE")
        );
        // Unset fields fall back to defaults.
        assert!(config.headless);
        assert!(config.encoding.is_none());
    }
}
