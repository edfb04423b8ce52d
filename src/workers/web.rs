//! Web worker
//!
//! Two-step loop per round: a query-optimizer step rewrites the user query
//! into effective search terms, then a retrieval step issues them to the
//! search provider and optionally pulls page content. The loop is bounded so
//! poor search quality never turns into unbounded iteration.

use crate::error::ProviderError;
use crate::llm::LlmClient;
use crate::models::{WorkerKind, WorkerOutcome};
use crate::providers::search::{SearchHit, SearchProvider};
use crate::workers::{with_deadline, Worker};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const OPTIMIZER_SYSTEM_PROMPT: &str = "You turn user questions into effective web \
search queries. Reply with the search terms only, no commentary.";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You synthesize web search results into a \
clear answer. Use only the provided results; do not invent facts.";

pub struct WebWorker {
    search: Arc<dyn SearchProvider>,
    llm: Arc<dyn LlmClient>,
    /// Optimizer/retrieval rounds before giving up.
    max_rounds: usize,
}

impl WebWorker {
    pub fn new(search: Arc<dyn SearchProvider>, llm: Arc<dyn LlmClient>, max_rounds: usize) -> Self {
        Self {
            search,
            llm,
            max_rounds: max_rounds.max(1),
        }
    }

    async fn run(&self, query: &str, context: Option<&str>) -> std::result::Result<String, String> {
        let mut terms = query.to_string();
        let mut last_failure = format!("no search results for {:?}", query);

        for round in 0..self.max_rounds {
            terms = self.optimize_terms(query, context, round, &terms).await;
            debug!(round, terms = %terms, "Web worker searching");

            match self.search.search(&terms).await {
                Ok(hits) if !hits.is_empty() => {
                    return Ok(self.compose_answer(query, &hits).await);
                }
                Ok(_) => {
                    last_failure = format!("no search results for {:?}", terms);
                }
                Err(ProviderError::NoResults(detail)) => {
                    last_failure = detail;
                }
                Err(ProviderError::RateLimited(detail)) => {
                    return Err(format!("search rate limited: {}", detail));
                }
                Err(e) => return Err(e.to_string()),
            }
        }

        Err(last_failure)
    }

    /// Rewrite the query into search terms. Degrades to the raw query when
    /// the text-generation collaborator is down.
    async fn optimize_terms(
        &self,
        query: &str,
        context: Option<&str>,
        round: usize,
        previous_terms: &str,
    ) -> String {
        let mut prompt = String::new();
        if let Some(facts) = context {
            prompt.push_str(&format!("Known facts so far:\n{}\n\n", facts));
        }
        prompt.push_str(&format!("Question: {}", query));
        if round > 0 {
            prompt.push_str(&format!(
                "\n\nThe terms {:?} returned nothing useful; try a different angle.",
                previous_terms
            ));
        }

        match self.llm.generate(&prompt, Some(OPTIMIZER_SYSTEM_PROMPT)).await {
            Ok(terms) => {
                let terms = terms.trim();
                if terms.is_empty() {
                    query.to_string()
                } else {
                    terms.lines().next().unwrap_or(terms).to_string()
                }
            }
            Err(e) => {
                debug!("Query optimizer unavailable, using raw query: {}", e);
                query.to_string()
            }
        }
    }

    /// Build the answer from search hits: pull the top page when possible,
    /// then let the LLM synthesize; fall back to a formatted hit list.
    async fn compose_answer(&self, query: &str, hits: &[SearchHit]) -> String {
        let mut digest = String::new();
        for hit in hits.iter().take(5) {
            digest.push_str(&format!("- {}: {} ({})\n", hit.title, hit.snippet, hit.url));
        }

        if let Some(top) = hits.first() {
            match self.search.fetch(&top.url).await {
                Ok(page) if !page.is_empty() => {
                    digest.push_str(&format!("\nTop page content:\n{}\n", page));
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping page fetch for {}: {}", top.url, e),
            }
        }

        let prompt = format!("Question: {}\n\nSearch results:\n{}", query, digest);

        match self.llm.generate(&prompt, Some(SYNTHESIS_SYSTEM_PROMPT)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Result synthesis unavailable, returning raw hits: {}", e);
                let mut fallback = String::from("Here is what the web reports:\n");
                for hit in hits.iter().take(5) {
                    fallback.push_str(&format!("- {}: {} ({})\n", hit.title, hit.snippet, hit.url));
                }
                fallback.trim_end().to_string()
            }
        }
    }
}

#[async_trait]
impl Worker for WebWorker {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Web
    }

    async fn answer(
        &self,
        query: &str,
        context: Option<&str>,
        timeout: Duration,
    ) -> WorkerOutcome {
        with_deadline(timeout, self.run(query, context)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlm, UnavailableLlm};
    use crate::providers::search::MockSearchProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Search mock that counts calls and never finds anything.
    struct EmptySearch {
        calls: AtomicUsize,
    }

    impl EmptySearch {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for EmptySearch {
        async fn search(&self, _terms: &str) -> std::result::Result<Vec<SearchHit>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn fetch(&self, _url: &str) -> std::result::Result<String, ProviderError> {
            Err(ProviderError::Unavailable("no pages".to_string()))
        }
    }

    #[tokio::test]
    async fn test_successful_search_synthesized_by_llm() {
        let worker = WebWorker::new(
            Arc::new(MockSearchProvider::default()),
            Arc::new(MockLlm::new("Markets closed mixed today.")),
            2,
        );
        let outcome = worker
            .answer("market news", None, Duration::from_secs(1))
            .await;
        assert_eq!(
            outcome,
            WorkerOutcome::Ok {
                text: "Markets closed mixed today.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_llm_outage_degrades_to_hit_list() {
        let worker = WebWorker::new(
            Arc::new(MockSearchProvider::default()),
            Arc::new(UnavailableLlm),
            2,
        );
        let outcome = worker
            .answer("market news", None, Duration::from_secs(1))
            .await;
        let text = outcome.text().expect("should still succeed");
        assert!(text.contains("Market wrap"));
    }

    #[tokio::test]
    async fn test_retrieval_loop_is_bounded() {
        let search = Arc::new(EmptySearch::new());
        let worker = WebWorker::new(search.clone(), Arc::new(UnavailableLlm), 2);

        let outcome = worker
            .answer("unfindable thing", None, Duration::from_secs(1))
            .await;

        assert!(matches!(outcome, WorkerOutcome::Failed { .. }));
        assert_eq!(search.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_stops_the_loop() {
        struct RateLimitedSearch;

        #[async_trait]
        impl SearchProvider for RateLimitedSearch {
            async fn search(
                &self,
                _terms: &str,
            ) -> std::result::Result<Vec<SearchHit>, ProviderError> {
                Err(ProviderError::RateLimited("quota".to_string()))
            }

            async fn fetch(&self, _url: &str) -> std::result::Result<String, ProviderError> {
                Err(ProviderError::Unavailable("no pages".to_string()))
            }
        }

        let worker = WebWorker::new(Arc::new(RateLimitedSearch), Arc::new(UnavailableLlm), 3);
        let outcome = worker.answer("anything", None, Duration::from_secs(1)).await;
        match outcome {
            WorkerOutcome::Failed { reason } => assert!(reason.contains("rate limited")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
