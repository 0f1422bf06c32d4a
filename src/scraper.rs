use chrono::Local;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::extract::{Document, Link};
use crate::policy::{ProxyPool, ProxyStats, RateLimiter};
use crate::utils::get_random_user_agent;

/// Scraper for static HTML fetched over HTTP.
///
/// Every fetch goes through the policy gate: throttled to the configured
/// rate, routed through the next proxy in rotation when the pool is
/// non-empty, and its outcome recorded against that proxy. Parsing is
/// delegated to [`Document`].
pub struct StaticScraper {
    client: reqwest::Client,
    limiter: RateLimiter,
    proxies: ProxyPool,
    config: ScraperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub timestamp: String,
    pub title: Option<String>,
    pub links: Vec<Link>,
    pub table_count: usize,
    pub text_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSession {
    pub start_time: String,
    pub results: Vec<PageSummary>,
    pub errors: Vec<String>,
    pub total_pages_scraped: usize,
    pub total_links_found: usize,
}

fn header_map(headers: &std::collections::HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ScrapeError::General(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ScrapeError::General(format!("invalid header value for '{}': {}", name, e))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

impl StaticScraper {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let limiter = RateLimiter::new(config.requests_per_second)?;
        let proxies = ProxyPool::new(config.proxies.clone());
        let client = Self::build_client(&config, None)?;

        Ok(Self {
            client,
            limiter,
            proxies,
            config,
        })
    }

    fn build_client(config: &ScraperConfig, proxy: Option<&str>) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .default_headers(header_map(&config.headers)?);

        if let Some(endpoint) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(endpoint)?);
        }

        Ok(builder.build()?)
    }

    fn has_header(&self, name: &str) -> bool {
        self.config
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case(name))
    }

    /// Fetch one URL through the policy gate and return the raw page.
    pub async fn fetch(&self, url: &str) -> Result<Document> {
        self.limiter.throttle().await;
        let proxy = self.proxies.next_proxy().await;

        let result = match proxy.as_deref() {
            Some(endpoint) => {
                log::debug!("Fetching {} via proxy {}", url, endpoint);
                match Self::build_client(&self.config, Some(endpoint)) {
                    Ok(client) => self.send(&client, url).await,
                    Err(e) => Err(e),
                }
            }
            None => self.send(&self.client, url).await,
        };

        if let Some(endpoint) = proxy.as_deref() {
            self.proxies.record_outcome(endpoint, result.is_ok()).await;
        }

        result
    }

    async fn send(&self, client: &reqwest::Client, url: &str) -> Result<Document> {
        let mut request = client.get(url);

        if !self.has_header("user-agent") {
            request = request.header("User-Agent", get_random_user_agent());
        }
        if !self.has_header("accept") {
            request = request.header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            );
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::from_status(status.as_u16(), url));
        }

        let final_url = response.url().to_string();
        let charset = self.config.encoding.as_deref().unwrap_or("utf-8");
        let html = response.text_with_charset(charset).await?;

        Ok(Document::new(final_url, html))
    }

    /// Scrape a batch of URLs, collecting per-page summaries and keeping
    /// going past individual failures.
    pub async fn scrape_all(&self, urls: &[String]) -> ScrapeSession {
        let start_time = Local::now().to_rfc3339();
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for url in urls {
            log::info!("Scraping: {}", url);
            match self.fetch(url).await {
                Ok(document) => {
                    let links = document.links();
                    results.push(PageSummary {
                        url: document.url().to_string(),
                        timestamp: Local::now().to_rfc3339(),
                        title: document.title(),
                        table_count: document.tables().len(),
                        text_chars: document.text().chars().count(),
                        links,
                    });
                }
                Err(e) => {
                    log::error!("Failed to scrape {}: {}", url, e);
                    errors.push(format!("Failed to scrape {}: {}", url, e));
                }
            }
        }

        let total_links_found = results.iter().map(|r| r.links.len()).sum();

        ScrapeSession {
            start_time,
            total_pages_scraped: results.len(),
            total_links_found,
            results,
            errors,
        }
    }

    /// Change the permitted request rate; takes effect on the next fetch.
    pub async fn set_rate_limit(&self, requests_per_second: f64) -> Result<()> {
        self.limiter.set_rate_limit(requests_per_second).await
    }

    /// Append a proxy endpoint to the rotation.
    pub async fn add_proxy(&self, endpoint: impl Into<String>) {
        self.proxies.add_proxy(endpoint).await;
    }

    /// Health counters for the proxy pool, in rotation order.
    pub async fn proxy_stats(&self) -> Vec<ProxyStats> {
        self.proxies.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_non_positive_rate() {
        let config = ScraperConfig {
            requests_per_second: 0.0,
            ..Default::default()
        };
        let err = StaticScraper::new(config).unwrap_err();
        assert!(matches!(err, ScrapeError::General(_)));
    }

    #[test]
    fn test_new_rejects_invalid_header_name() {
        let mut config = ScraperConfig::default();
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(StaticScraper::new(config).is_err());
    }

    #[tokio::test]
    async fn test_configured_proxies_enter_rotation() {
        let config = ScraperConfig {
            proxies: vec![
                "http://127.0.0.1:8080".to_string(),
                "http://127.0.0.1:8081".to_string(),
            ],
            ..Default::default()
        };
        let scraper = StaticScraper::new(config).unwrap();
        let stats = scraper.proxy_stats().await;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].endpoint, "http://127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_add_proxy_grows_pool() {
        let scraper = StaticScraper::new(ScraperConfig::default()).unwrap();
        scraper.add_proxy("http://127.0.0.1:9000").await;
        assert_eq!(scraper.proxy_stats().await.len(), 1);
    }

    #[test]
    fn test_user_agent_header_detection_ignores_case() {
        let mut config = ScraperConfig::default();
        config
            .headers
            .insert("user-agent".to_string(), "custom/1.0".to_string());
        let scraper = StaticScraper::new(config).unwrap();
        assert!(scraper.has_header("User-Agent"));
    }
}
