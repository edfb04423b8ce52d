//! Intent Classifier
//!
//! Maps a query (plus recent session history) to a RoutingDecision:
//! - Financial-data vocabulary routes to the data worker
//! - Recency/news vocabulary routes to the web worker
//! - Cues for both route to sequential delegation (facts first, context second)
//! - No strong cue: one LLM call decides; if that fails, the orchestrator
//!   falls back to its configured default worker

use crate::error::{OrchestratorError, ProviderError, Result};
use crate::llm::LlmClient;
use crate::models::{RoutingDecision, Turn, WorkerKind};
use std::sync::Arc;
use tracing::debug;

/// Static keyword lists, zero allocation
const DATA_KEYWORDS: &[&str] = &[
    // Quotes and price action
    "price", "quote", "stock", "share", "ticker", "volume", "volatility",
    // Technical indicators
    "rsi", "macd", "sma", "ema", "bollinger", "stochastic", "moving average", "indicator",
    // Fundamentals
    "earnings", "revenue", "eps", "p/e", "pe ratio", "dividend", "fundamental",
    "balance sheet", "income statement", "cash flow", "market cap",
    // Economic series
    "gdp", "cpi", "inflation", "treasury", "interest rate", "unemployment",
    // Alternative assets
    "forex", "exchange rate", "crypto", "bitcoin",
];

const WEB_KEYWORDS: &[&str] = &[
    // Recency
    "latest", "recent", "breaking", "just announced",
    // News and events
    "news", "headline", "announcement", "article", "press release",
    // Trends and happenings
    "trend", "trending", "happening", "rumor", "launch",
];

/// All-caps words that look like tickers but aren't.
const TICKER_STOPWORDS: &[&str] = &[
    "I", "A", "OK", "THE", "WHAT", "WHY", "HOW", "AND", "FOR", "US", "USA",
];

const ROUTING_SYSTEM_PROMPT: &str = "You route user queries in a financial chat \
assistant to specialized workers:\n\
- data: stock quotes, technical indicators, company fundamentals, economic series\n\
- web: web search, news, current events, general context\n\
Reply with exactly one word: \"data\", \"web\", \"both\" (data first, then web), \
or \"parallel\" (both at once, order irrelevant).";

/// Intent classifier. Stateless; safe to share across concurrent requests.
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classify a query using at most the `max_history` most recent turns.
    pub async fn classify(
        &self,
        query: &str,
        history: &[Turn],
        max_history: usize,
    ) -> Result<RoutingDecision> {
        let query = query.trim();
        if query.is_empty() {
            return Err(OrchestratorError::ClassificationError(
                "cannot classify an empty query".to_string(),
            ));
        }

        let lowered = query.to_lowercase();

        let data_score = DATA_KEYWORDS
            .iter()
            .filter(|kw| lowered.contains(**kw))
            .count()
            + usize::from(contains_ticker(query));

        let web_score = WEB_KEYWORDS
            .iter()
            .filter(|kw| lowered.contains(**kw))
            .count();

        debug!(data_score, web_score, "Keyword scoring");

        let decision = match (data_score > 0, web_score > 0) {
            (true, true) => RoutingDecision::Sequential(vec![WorkerKind::Data, WorkerKind::Web]),
            (true, false) => RoutingDecision::Single(WorkerKind::Data),
            (false, true) => RoutingDecision::Single(WorkerKind::Web),
            // No strong cue either way: let the LLM decide
            (false, false) => self.classify_with_llm(query, history, max_history).await?,
        };

        Ok(decision)
    }

    async fn classify_with_llm(
        &self,
        query: &str,
        history: &[Turn],
        max_history: usize,
    ) -> Result<RoutingDecision> {
        let mut prompt = String::new();

        // Bound the context handed to the collaborator
        let start = history.len().saturating_sub(max_history);
        let recent = &history[start..];

        if !recent.is_empty() {
            prompt.push_str("Recent conversation:\n");
            for turn in recent {
                prompt.push_str(&format!(
                    "User: {}\nRouted: {}\n",
                    turn.query, turn.decision
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("Query: {}", query));

        let reply = self
            .llm
            .generate(&prompt, Some(ROUTING_SYSTEM_PROMPT))
            .await
            .map_err(|e| match e {
                ProviderError::RateLimited(msg) => OrchestratorError::ClassificationError(
                    format!("routing collaborator rate limited: {}", msg),
                ),
                other => OrchestratorError::ClassificationError(format!(
                    "routing collaborator failed: {}",
                    other
                )),
            })?;

        parse_routing_label(&reply)
    }
}

/// Parse the first recognized routing label out of an LLM reply.
fn parse_routing_label(reply: &str) -> Result<RoutingDecision> {
    let lowered = reply.to_lowercase();

    for word in lowered.split(|c: char| !c.is_alphanumeric()) {
        match word {
            "data" => return Ok(RoutingDecision::Single(WorkerKind::Data)),
            "web" => return Ok(RoutingDecision::Single(WorkerKind::Web)),
            "both" | "sequential" => {
                return Ok(RoutingDecision::Sequential(vec![
                    WorkerKind::Data,
                    WorkerKind::Web,
                ]))
            }
            "parallel" => {
                return Ok(RoutingDecision::Parallel(vec![
                    WorkerKind::Data,
                    WorkerKind::Web,
                ]))
            }
            _ => {}
        }
    }

    Err(OrchestratorError::ClassificationError(format!(
        "unparseable routing label: {:?}",
        reply
    )))
}

/// Fast path ticker detection: a short all-caps token like AAPL or TSLA.
fn contains_ticker(query: &str) -> bool {
    query
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|token| {
            token.len() >= 2
                && token.len() <= 5
                && token.chars().all(|c| c.is_ascii_uppercase())
                && !TICKER_STOPWORDS.contains(&token)
        })
}
