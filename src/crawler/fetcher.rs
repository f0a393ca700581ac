//! Page rendering
//!
//! This module defines the page renderer capability the crawl step fetches
//! pages through, and a default HTTP implementation:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with redirect following
//! - Content-Type checks so only HTML is handed to extraction
//!
//! The HTTP renderer does not run JavaScript. Browser-backed renderers plug in
//! through the same trait.

use crate::config::UserAgentConfig;
use crate::RippleError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// Maximum number of redirects followed for one page
const MAX_REDIRECTS: usize = 10;

/// A page as the renderer left it
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after redirects; relative links resolve against it
    pub url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Page title (from the <title> tag)
    pub title: Option<String>,

    /// Serialized document
    pub html: String,
}

impl RenderedPage {
    /// Builds a page from its HTML, extracting the title
    pub fn from_html(url: Url, status_code: u16, html: impl Into<String>) -> Self {
        let html = html.into();
        let title = extract_title(&Html::parse_document(&html));
        Self {
            url,
            status_code,
            title,
            html,
        }
    }

    /// Raw `href` values of every anchor on the page, in document order
    pub fn anchor_hrefs(&self) -> Vec<String> {
        let document = Html::parse_document(&self.html);
        let selector = match Selector::parse("a[href]") {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Capability that navigates to a URL and yields the rendered page
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RippleError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::config::UserAgentConfig;
/// use ripple_crawl::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent_string())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP renderer
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RippleError> {
        let navigation_error = |message: String| RippleError::Navigation {
            url: url.to_string(),
            message,
        };

        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                navigation_error("request timeout".to_string())
            } else if e.is_connect() {
                navigation_error("connection refused".to_string())
            } else if e.is_redirect() {
                navigation_error("too many redirects".to_string())
            } else {
                navigation_error(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(navigation_error(format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if !content_type.is_empty()
            && !content_type.contains("text/html")
            && !content_type.contains("application/xhtml")
        {
            return Err(navigation_error(format!(
                "expected HTML, got Content-Type '{}'",
                content_type
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        tracing::debug!(
            "Rendered {} ({} bytes, status {})",
            final_url,
            body.len(),
            status.as_u16()
        );

        Ok(RenderedPage::from_html(final_url, status.as_u16(), body))
    }
}
