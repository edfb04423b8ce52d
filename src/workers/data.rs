//! Data worker
//!
//! Translates the natural-language query into the financial-data provider's
//! call shape and renders the provider's reply back into prose. Indicator
//! math and symbol resolution are the provider's responsibility.

use crate::error::ProviderError;
use crate::models::{WorkerKind, WorkerOutcome};
use crate::providers::finance::{FinanceAnswer, FinanceProvider};
use crate::workers::{with_deadline, Worker};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct DataWorker {
    provider: Arc<dyn FinanceProvider>,
}

impl DataWorker {
    pub fn new(provider: Arc<dyn FinanceProvider>) -> Self {
        Self { provider }
    }

    async fn run(&self, query: &str) -> std::result::Result<String, String> {
        debug!(query = %query, "Data worker querying provider");

        match self.provider.query(query).await {
            Ok(FinanceAnswer::Prose(text)) => Ok(text),
            Ok(FinanceAnswer::Structured(data)) => Ok(render_structured(&data)),
            Err(ProviderError::InvalidSymbol(detail)) => {
                Err(format!("unrecognized symbol: {}", detail))
            }
            Err(ProviderError::RateLimited(detail)) => {
                Err(format!("financial data rate limited: {}", detail))
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

#[async_trait]
impl Worker for DataWorker {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Data
    }

    async fn answer(
        &self,
        query: &str,
        _context: Option<&str>,
        timeout: Duration,
    ) -> WorkerOutcome {
        with_deadline(timeout, self.run(query)).await
    }
}

/// Render a structured provider reply into prose. Flat objects become
/// "key: value" lines; anything deeper falls back to a pretty JSON block.
fn render_structured(data: &Value) -> String {
    if let Some(object) = data.as_object() {
        let all_scalar = object.values().all(|v| !v.is_object() && !v.is_array());
        if all_scalar && !object.is_empty() {
            let mut out = String::new();
            for (key, value) in object {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.push_str(&format!("{}: {}\n", key, rendered));
            }
            return out.trim_end().to_string();
        }
    }

    let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!("```json\n{}\n```", pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::finance::MockFinanceProvider;
    use serde_json::json;

    struct FailingProvider;

    #[async_trait]
    impl FinanceProvider for FailingProvider {
        async fn query(&self, _request: &str) -> std::result::Result<FinanceAnswer, ProviderError> {
            Err(ProviderError::Unavailable("provider offline".to_string()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl FinanceProvider for SlowProvider {
        async fn query(&self, _request: &str) -> std::result::Result<FinanceAnswer, ProviderError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(FinanceAnswer::Prose("too late".to_string()))
        }
    }

    #[tokio::test]
    async fn test_prose_passes_through() {
        let worker = DataWorker::new(Arc::new(MockFinanceProvider::prose("AAPL at $150.25")));
        let outcome = worker
            .answer("price of AAPL", None, Duration::from_secs(1))
            .await;
        assert_eq!(
            outcome,
            WorkerOutcome::Ok {
                text: "AAPL at $150.25".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_flat_structured_rendered_as_lines() {
        let worker = DataWorker::new(Arc::new(MockFinanceProvider::structured(json!({
            "symbol": "AAPL",
            "close": 150.25
        }))));
        let outcome = worker.answer("AAPL quote", None, Duration::from_secs(1)).await;
        let text = outcome.text().unwrap();
        assert!(text.contains("symbol: AAPL"));
        assert!(text.contains("close: 150.25"));
    }

    #[tokio::test]
    async fn test_nested_structured_rendered_as_json() {
        let worker = DataWorker::new(Arc::new(MockFinanceProvider::structured(json!({
            "series": [1, 2, 3]
        }))));
        let outcome = worker.answer("series", None, Duration::from_secs(1)).await;
        assert!(outcome.text().unwrap().starts_with("```json"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported_not_raised() {
        let worker = DataWorker::new(Arc::new(FailingProvider));
        let outcome = worker.answer("anything", None, Duration::from_secs(1)).await;
        assert!(matches!(outcome, WorkerOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let worker = DataWorker::new(Arc::new(SlowProvider));
        let outcome = worker
            .answer("anything", None, Duration::from_millis(20))
            .await;
        assert_eq!(outcome, WorkerOutcome::Timeout);
    }
}
