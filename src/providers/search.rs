//! Web-search/scrape provider
//!
//! Google Custom Search over HTTP, plus a page fetch that reduces HTML to
//! plain text for downstream synthesis.

use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Cap on extracted page text handed back from `fetch`.
const MAX_PAGE_CHARS: usize = 8_000;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Web-search collaborator contract.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, terms: &str) -> std::result::Result<Vec<SearchHit>, ProviderError>;

    /// Fetch a page and return its extracted text content.
    async fn fetch(&self, url: &str) -> std::result::Result<String, ProviderError>;
}

/// Google Custom Search API client.
pub struct GoogleSearchProvider {
    client: Client,
    api_key: String,
    engine_id: String,
    search_url: String,
}

impl GoogleSearchProvider {
    /// Build from `GOOGLE_SEARCH_API_KEY` / `GOOGLE_SEARCH_ENGINE_ID`
    /// (optional `GOOGLE_CUSTOM_SEARCH_URL` override). Returns None when
    /// credentials are unset so the caller can fall back to a mock.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("GOOGLE_SEARCH_API_KEY").ok()?;
        let engine_id = env::var("GOOGLE_SEARCH_ENGINE_ID").ok()?;
        let search_url = env::var("GOOGLE_CUSTOM_SEARCH_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/customsearch/v1".to_string());

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(20))
            .build()
            .ok()?;

        Some(Self {
            client,
            api_key,
            engine_id,
            search_url,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn search(&self, terms: &str) -> std::result::Result<Vec<SearchHit>, ProviderError> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", terms),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("Google search request failed: {}", e);
                ProviderError::Unavailable(format!("search request failed: {}", e))
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited("search API rate limit".to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "search API returned {}",
                status
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("invalid search response: {}", e)))?;

        let hits: Vec<SearchHit> = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(SearchHit {
                            title: item.get("title")?.as_str()?.to_string(),
                            snippet: item
                                .get("snippet")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            url: item.get("link")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        info!(terms = %terms, count = hits.len(), "Google search completed");

        Ok(hits)
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, ProviderError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("Page fetch failed for {}: {}", url, e);
            ProviderError::Unavailable(format!("fetch failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "fetch returned {} for {}",
                response.status(),
                url
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("fetch body error: {}", e)))?;

        let mut text = strip_html(&html);
        text.truncate(MAX_PAGE_CHARS);
        Ok(text)
    }
}

/// Reduce an HTML document to readable text: drops tags and the contents of
/// script/style blocks, collapses whitespace runs.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 4);
    let mut in_tag = false;
    let mut skip_block = false;
    let mut current_tag = String::new();
    let mut last_was_space = true;

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                current_tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let tag_lower = current_tag.to_lowercase();
                let tag_name = tag_lower.split_whitespace().next().unwrap_or("");
                match tag_name {
                    "script" | "style" => skip_block = true,
                    "/script" | "/style" => skip_block = false,
                    // Block-level tags act as word breaks
                    "p" | "/p" | "br" | "br/" | "div" | "/div" | "li" | "/li" | "h1" | "h2"
                    | "h3" | "/h1" | "/h2" | "/h3" | "tr" | "/tr" => {
                        if !last_was_space {
                            out.push(' ');
                            last_was_space = true;
                        }
                    }
                    _ => {}
                }
            }
            _ if in_tag => current_tag.push(ch),
            _ if skip_block => {}
            c if c.is_whitespace() => {
                if !last_was_space {
                    out.push(' ');
                    last_was_space = true;
                }
            }
            c => {
                out.push(c);
                last_was_space = false;
            }
        }
    }

    out.trim().to_string()
}

/// Mock provider for development & testing.
pub struct MockSearchProvider {
    hits: Vec<SearchHit>,
    page: Option<String>,
}

impl MockSearchProvider {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits, page: None }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new(vec![SearchHit {
            title: "Market wrap".to_string(),
            snippet: "Stocks closed mixed as investors weighed earnings.".to_string(),
            url: "https://example.com/market-wrap".to_string(),
        }])
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, _terms: &str) -> std::result::Result<Vec<SearchHit>, ProviderError> {
        Ok(self.hits.clone())
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, ProviderError> {
        self.page
            .clone()
            .ok_or_else(|| ProviderError::Unavailable(format!("no page content for {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_basic() {
        let html = "<html><head><style>body { color: red; }</style></head>\
                    <body><h1>Title</h1><p>Hello <b>world</b>.</p>\
                    <script>var x = 1;</script></body></html>";
        let text = strip_html(html);
        assert_eq!(text, "Title Hello world.");
    }

    #[test]
    fn test_strip_html_collapses_whitespace() {
        let text = strip_html("<p>a\n\n   b</p>\t<p>c</p>");
        assert_eq!(text, "a b c");
    }

    #[tokio::test]
    async fn test_mock_search() {
        let provider = MockSearchProvider::default();
        let hits = provider.search("tesla news").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(provider.fetch("https://example.com").await.is_err());
    }
}
