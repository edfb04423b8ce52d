//! Financial-data provider
//!
//! The provider resolves tickers, indicators and time ranges itself and
//! returns structured or prose facts; no indicator math happens on our side.

use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::warn;

/// What the provider hands back: already-written prose, or structured data
/// the worker renders into prose.
#[derive(Debug, Clone)]
pub enum FinanceAnswer {
    Prose(String),
    Structured(Value),
}

/// Financial-data collaborator contract.
#[async_trait]
pub trait FinanceProvider: Send + Sync {
    /// Resolve a natural-language request (quotes, indicators, fundamentals,
    /// economic series) into facts.
    async fn query(&self, request: &str) -> std::result::Result<FinanceAnswer, ProviderError>;
}

/// HTTP-backed provider client.
pub struct HttpFinanceProvider {
    client: Client,
    base_url: String,
}

impl HttpFinanceProvider {
    /// Build from `FINANCIAL_API_BASE_URL`. Returns None when unset so the
    /// caller can fall back to a mock.
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("FINANCIAL_API_BASE_URL").ok()?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FinanceProvider for HttpFinanceProvider {
    async fn query(&self, request: &str) -> std::result::Result<FinanceAnswer, ProviderError> {
        let url = format!("{}/api/query", self.base_url);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&json!({ "query": request }))
            .send()
            .await
            .map_err(|e| {
                warn!("Financial API request failed: {}", e);
                ProviderError::Unavailable(format!("financial API request failed: {}", e))
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited(
                "financial API rate limit".to_string(),
            ));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("invalid JSON response: {}", e)))?;

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();

            if detail.to_lowercase().contains("symbol") {
                return Err(ProviderError::InvalidSymbol(detail));
            }
            return Err(ProviderError::Unavailable(format!(
                "financial API returned {}: {}",
                status, detail
            )));
        }

        // Prose takes precedence; otherwise hand the structured payload back.
        if let Some(text) = body.get("text").and_then(Value::as_str) {
            return Ok(FinanceAnswer::Prose(text.to_string()));
        }
        if let Some(data) = body.get("data") {
            return Ok(FinanceAnswer::Structured(data.clone()));
        }

        Ok(FinanceAnswer::Structured(body))
    }
}

/// Mock provider for development & testing.
pub struct MockFinanceProvider {
    answer: FinanceAnswer,
}

impl MockFinanceProvider {
    pub fn prose(text: impl Into<String>) -> Self {
        Self {
            answer: FinanceAnswer::Prose(text.into()),
        }
    }

    pub fn structured(data: Value) -> Self {
        Self {
            answer: FinanceAnswer::Structured(data),
        }
    }
}

impl Default for MockFinanceProvider {
    fn default() -> Self {
        Self::prose("AAPL last traded at $150.25, up 2.3% on the day.")
    }
}

#[async_trait]
impl FinanceProvider for MockFinanceProvider {
    async fn query(&self, _request: &str) -> std::result::Result<FinanceAnswer, ProviderError> {
        Ok(self.answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_prose() {
        let provider = MockFinanceProvider::prose("TSLA at $242.10");
        match provider.query("tesla price").await.unwrap() {
            FinanceAnswer::Prose(text) => assert_eq!(text, "TSLA at $242.10"),
            FinanceAnswer::Structured(_) => panic!("expected prose"),
        }
    }
}
