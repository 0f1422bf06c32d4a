use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{HttpResponse, Result, web};
use serde::{Deserialize, Serialize};

use crate::browser::BrowserScraper;
use crate::config::ScraperConfig;
use crate::extract::Link;
use crate::scraper::{ScrapeSession, StaticScraper};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Mutex<Vec<ScrapeSession>>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub urls: Vec<String>,
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: f64,
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

fn default_rate_limit() -> f64 {
    2.0
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub message: String,
    pub session: Option<ScrapeSession>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenderRequest {
    pub url: String,
    /// Selector to wait for before reading the page.
    #[serde(default)]
    pub wait_for: Option<String>,
    /// Scroll to the bottom to trigger lazy-loaded content.
    #[serde(default)]
    pub scroll: bool,
    /// Script to run in the page after load.
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_headless() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenderedPage {
    pub url: String,
    pub title: Option<String>,
    pub html_chars: usize,
    pub links: Vec<Link>,
    pub script_result: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenderResponse {
    pub success: bool,
    pub message: String,
    pub page: Option<RenderedPage>,
}

pub async fn health_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "quickscrape"
    })))
}

pub async fn scrape_handler(
    state: web::Data<AppState>,
    req: web::Json<ScrapeRequest>,
) -> Result<HttpResponse> {
    log::info!("Received scrape request for {} URL(s)", req.urls.len());

    let config = ScraperConfig {
        headers: req.headers.clone(),
        encoding: req.encoding.clone(),
        requests_per_second: req.requests_per_second,
        proxies: req.proxies.clone(),
        ..Default::default()
    };

    let scraper = match StaticScraper::new(config) {
        Ok(s) => s,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(ScrapeResponse {
                success: false,
                message: format!("Failed to create scraper: {}", e),
                session: None,
            }));
        }
    };

    let session = scraper.scrape_all(&req.urls).await;

    log::info!(
        "Scraping complete: {} pages scraped, {} links found",
        session.total_pages_scraped,
        session.total_links_found
    );

    state.sessions.lock().unwrap().push(session.clone());

    Ok(HttpResponse::Ok().json(ScrapeResponse {
        success: session.errors.is_empty(),
        message: format!(
            "Scraped {} of {} pages with {} links",
            session.total_pages_scraped,
            req.urls.len(),
            session.total_links_found
        ),
        session: Some(session),
    }))
}

async fn drive(scraper: &mut BrowserScraper, req: &RenderRequest) -> crate::error::Result<RenderedPage> {
    scraper.goto(&req.url).await?;

    if let Some(selector) = &req.wait_for {
        scraper.wait_for(selector, Duration::from_secs(10)).await?;
    }
    if req.scroll {
        scraper.scroll_to_bottom(10, Duration::from_millis(500)).await?;
    }

    let script_result = match &req.script {
        Some(script) => Some(scraper.execute_script(script).await?),
        None => None,
    };

    let document = scraper.content().await?;
    Ok(RenderedPage {
        url: document.url().to_string(),
        title: document.title(),
        html_chars: document.html().len(),
        links: document.links(),
        script_result,
    })
}

pub async fn render_handler(req: web::Json<RenderRequest>) -> Result<HttpResponse> {
    log::info!("Received render request for {}", req.url);

    let config = ScraperConfig {
        headless: req.headless,
        ..Default::default()
    };

    let mut scraper = BrowserScraper::new(config);
    if let Err(e) = scraper.open().await {
        return Ok(HttpResponse::InternalServerError().json(RenderResponse {
            success: false,
            message: format!("Failed to open browser session: {}", e),
            page: None,
        }));
    }

    // The session must be released whether or not the page work succeeded.
    let outcome = drive(&mut scraper, &req).await;
    if let Err(e) = scraper.close().await {
        log::warn!("Browser session teardown failed: {}", e);
    }

    match outcome {
        Ok(page) => Ok(HttpResponse::Ok().json(RenderResponse {
            success: true,
            message: format!("Rendered {}", page.url),
            page: Some(page),
        })),
        Err(e) => {
            log::error!("Rendering failed: {}", e);
            Ok(HttpResponse::Ok().json(RenderResponse {
                success: false,
                message: format!("Rendering failed: {}", e),
                page: None,
            }))
        }
    }
}

pub async fn get_sessions(state: web::Data<AppState>) -> Result<HttpResponse> {
    let sessions = state.sessions.lock().unwrap();
    Ok(HttpResponse::Ok().json(&*sessions))
}

pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<usize>,
) -> Result<HttpResponse> {
    let index = path.into_inner();
    let sessions = state.sessions.lock().unwrap();

    if index < sessions.len() {
        Ok(HttpResponse::Ok().json(&sessions[index]))
    } else {
        Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "Session not found"
        })))
    }
}

pub async fn clear_sessions(state: web::Data<AppState>) -> Result<HttpResponse> {
    state.sessions.lock().unwrap().clear();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "All sessions cleared"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_request_defaults() {
        let json = r#"{"urls": ["https://example.com"]}"#;
        let req: ScrapeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.requests_per_second, 2.0);
        assert!(req.proxies.is_empty());
    }

    #[test]
    fn test_render_request_defaults() {
        let json = r#"{"url": "https://example.com"}"#;
        let req: RenderRequest = serde_json::from_str(json).unwrap();
        assert!(req.headless);
        assert!(!req.scroll);
        assert!(req.wait_for.is_none());
    }
}
