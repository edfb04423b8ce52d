//! Response Synthesizer
//!
//! Merges multiple successful worker results into one coherent answer.
//! Results are presented to the text-generation collaborator in invocation
//! order so later facts can be framed as elaborating earlier ones. Only
//! successful results are ever passed in; nothing is fabricated for failed
//! invocations.

use crate::llm::LlmClient;
use crate::models::WorkerKind;
use std::sync::Arc;
use tracing::warn;

const SYNTHESIS_SYSTEM_PROMPT: &str = "You combine answers from specialized \
sources into one coherent response. Preserve the factual content of every \
source; do not add facts of your own. Do not mention the sources by name \
unless it helps the reader.";

pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Merge results, keeping their order. When the merge call fails, the
    /// answer degrades to an ordered concatenation so the user still gets
    /// every retrieved fact.
    pub async fn synthesize(&self, results: &[(WorkerKind, String)]) -> String {
        let mut prompt = String::new();
        for (i, (kind, text)) in results.iter().enumerate() {
            prompt.push_str(&format!("Source {} ({} worker):\n{}\n\n", i + 1, kind, text));
        }
        prompt.push_str("Combine the sources above into a single answer.");

        match self.llm.generate(&prompt, Some(SYNTHESIS_SYSTEM_PROMPT)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Synthesis collaborator failed, concatenating results: {}", e);
                results
                    .iter()
                    .map(|(_, text)| text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlm, UnavailableLlm};

    #[tokio::test]
    async fn test_merged_answer_comes_from_llm() {
        let synthesizer = Synthesizer::new(Arc::new(MockLlm::new("combined answer")));
        let results = vec![
            (WorkerKind::Data, "TSLA at $242.10".to_string()),
            (WorkerKind::Web, "Tesla announced a new factory.".to_string()),
        ];
        assert_eq!(synthesizer.synthesize(&results).await, "combined answer");
    }

    #[tokio::test]
    async fn test_degrade_preserves_order() {
        let synthesizer = Synthesizer::new(Arc::new(UnavailableLlm));
        let results = vec![
            (WorkerKind::Data, "facts first".to_string()),
            (WorkerKind::Web, "context second".to_string()),
        ];
        let answer = synthesizer.synthesize(&results).await;
        let facts_pos = answer.find("facts first").unwrap();
        let context_pos = answer.find("context second").unwrap();
        assert!(facts_pos < context_pos);
    }
}
