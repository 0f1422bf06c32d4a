use std::path::PathBuf;
use std::time::{Duration, Instant};

use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::extract::Document;

/// Common Chrome executable locations, checked when no path is configured.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Scraper for JavaScript-rendered pages, driven over the Chrome DevTools
/// Protocol.
///
/// The session lifecycle is explicit: `open()` launches the browser,
/// `close()` tears it down, and `close()` should be called on every exit
/// path. Dropping an open scraper without `close()` can leave the external
/// browser process running.
pub struct BrowserScraper {
    config: ScraperConfig,
    browser: Option<Browser>,
    page: Option<Page>,
}

impl From<CdpError> for ScrapeError {
    fn from(err: CdpError) -> Self {
        ScrapeError::General(format!("browser error: {}", err))
    }
}

fn resolve_executable(configured: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(ScrapeError::General(format!(
            "configured browser executable not found: {}",
            path.display()
        )));
    }

    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(ScrapeError::General(
        "Chrome/Chromium not found; install it or set browser_path".to_string(),
    ))
}

impl BrowserScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    /// Launch the browser session. A second `open()` on a live session is a
    /// no-op.
    pub async fn open(&mut self) -> Result<()> {
        if self.browser.is_some() {
            return Ok(());
        }

        let executable = resolve_executable(self.config.browser_path.as_ref())?;
        log::info!(
            "Launching browser at {} (headless={})",
            executable.display(),
            self.config.headless
        );

        let mut builder = BrowserConfig::builder().chrome_executable(executable);

        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(proxy) = self.config.proxies.first() {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        let config = builder
            .build()
            .map_err(|e| ScrapeError::General(format!("failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config).await?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(browser);
        Ok(())
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser
            .as_ref()
            .ok_or_else(|| ScrapeError::General("browser session not open; call open() first".to_string()))
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::General("no page loaded; call goto() first".to_string()))
    }

    /// Navigate the session to a URL and wait for the page to load.
    pub async fn goto(&mut self, url: &str) -> Result<()> {
        let browser = self.browser()?;

        let page = match self.page.clone() {
            Some(page) => {
                page.goto(url)
                    .await
                    .map_err(|e| ScrapeError::Request(format!("navigation to {} failed: {}", url, e)))?;
                page
            }
            None => browser
                .new_page(url)
                .await
                .map_err(|e| ScrapeError::Request(format!("navigation to {} failed: {}", url, e)))?,
        };

        if let Err(e) = page.wait_for_navigation().await {
            log::warn!("Navigation wait for {} ended early: {}", url, e);
        }

        self.page = Some(page);
        Ok(())
    }

    /// Run a script in the page and return its result as JSON.
    pub async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page()?.evaluate(script.to_string()).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Wait until an element matching the selector appears, polling until
    /// the timeout. Timing out is a parsing error: the caller expected the
    /// element to show up.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::Parsing(format!(
                    "element '{}' did not appear within {:?}",
                    selector, timeout
                )));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Scroll to the bottom of the page repeatedly until the height stops
    /// growing or `max_rounds` is reached. Returns the number of scroll
    /// rounds performed. Pauses between rounds so lazy content can load.
    pub async fn scroll_to_bottom(&self, max_rounds: usize, pause: Duration) -> Result<usize> {
        let page = self.page()?;
        let mut last_height: i64 = -1;

        for round in 0..max_rounds {
            let result = page
                .evaluate(
                    "window.scrollTo(0, document.body.scrollHeight); document.body.scrollHeight"
                        .to_string(),
                )
                .await?;
            let height: i64 = result.into_value().unwrap_or(0);

            if height == last_height {
                return Ok(round);
            }
            last_height = height;
            tokio::time::sleep(pause).await;
        }

        Ok(max_rounds)
    }

    /// The rendered HTML of the current page, ready for extraction.
    pub async fn content(&self) -> Result<Document> {
        let page = self.page()?;
        let url = page
            .url()
            .await?
            .map(|u| u.to_string())
            .unwrap_or_default();
        let html = page.content().await?;
        Ok(Document::new(url, html))
    }

    /// Tear down the session: close the page, shut the browser down and
    /// wait for the process to exit. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            browser.close().await?;
            let _ = browser.wait().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_goto_before_open_fails() {
        let mut scraper = BrowserScraper::new(ScraperConfig::default());
        let err = scraper.goto("https://example.com").await.unwrap_err();
        assert!(matches!(err, ScrapeError::General(_)));
        assert!(err.to_string().contains("open()"));
    }

    #[tokio::test]
    async fn test_content_before_goto_fails() {
        let scraper = BrowserScraper::new(ScraperConfig::default());
        assert!(scraper.content().await.is_err());
        assert!(scraper.execute_script("1 + 1").await.is_err());
    }

    #[tokio::test]
    async fn test_close_without_open_is_noop() {
        let mut scraper = BrowserScraper::new(ScraperConfig::default());
        assert!(scraper.close().await.is_ok());
        assert!(!scraper.is_open());
    }

    #[test]
    fn test_resolve_executable_rejects_missing_configured_path() {
        let path = PathBuf::from("/does/not/exist/chrome");
        assert!(resolve_executable(Some(&path)).is_err());
    }
}
