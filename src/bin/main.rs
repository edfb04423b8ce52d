use std::sync::Arc;
use stocksage_orchestrator::{
    classifier::IntentClassifier,
    config::OrchestratorConfig,
    llm::MockLlm,
    orchestrator::Orchestrator,
    providers::{MockFinanceProvider, MockSearchProvider},
    session::InMemorySessionStore,
    synthesizer::Synthesizer,
    workers::{DataWorker, WebWorker, WorkerRegistry},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("StockSage Orchestrator demo starting (mock providers)");

    let config = OrchestratorConfig::default();

    let llm = Arc::new(MockLlm::new(
        "Tesla trades at $242.10 and has announced a new factory this week.",
    ));
    let finance = Arc::new(MockFinanceProvider::prose(
        "TSLA last traded at $242.10, up 1.8% on the day.",
    ));
    let search = Arc::new(MockSearchProvider::default());

    let mut workers = WorkerRegistry::new();
    workers.register(Arc::new(DataWorker::new(finance)));
    workers.register(Arc::new(WebWorker::new(
        search,
        llm.clone(),
        config.search_rounds,
    )));

    let orchestrator = Orchestrator::new(
        IntentClassifier::new(llm.clone()),
        workers,
        Synthesizer::new(llm),
        Arc::new(InMemorySessionStore::new()),
        config,
    );

    let queries = [
        "What is the current price of TSLA?",
        "Tesla's stock price and recent news",
        "tell me something interesting",
    ];

    for query in queries {
        println!("\n=== QUERY: {} ===", query);

        match orchestrator.handle("demo-session", query).await {
            Ok(result) => {
                println!("Routing: {}", result.turn.decision);
                for invocation in &result.turn.invocations {
                    println!(
                        "  {} worker: {:?} ({} ms)",
                        invocation.kind, invocation.outcome, invocation.latency_ms
                    );
                }
                println!("Answer: {}", result.answer);
            }
            Err(e) => eprintln!("Query failed: {}", e),
        }
    }

    Ok(())
}
