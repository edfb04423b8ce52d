use std::sync::Arc;
use stocksage_orchestrator::{
    api::start_server,
    classifier::IntentClassifier,
    config::OrchestratorConfig,
    llm::GeminiClient,
    orchestrator::Orchestrator,
    providers::{
        FinanceProvider, GoogleSearchProvider, HttpFinanceProvider, MockFinanceProvider,
        MockSearchProvider, SearchProvider,
    },
    session::build_session_store,
    synthesizer::Synthesizer,
    workers::{DataWorker, WebWorker, WorkerRegistry},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("GEMINI_API_KEY not set; classification and synthesis will degrade");
        String::new()
    });

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let config = OrchestratorConfig::from_env();

    info!("StockSage Orchestrator - API Server");
    info!("Port: {}", api_port);
    info!(
        "Fallback worker: {} | worker timeout: {:?}",
        config.fallback_worker, config.worker_timeout
    );

    // Collaborators
    let llm = Arc::new(GeminiClient::new(gemini_api_key));

    let finance: Arc<dyn FinanceProvider> = match HttpFinanceProvider::from_env() {
        Some(provider) => Arc::new(provider),
        None => {
            warn!("FINANCIAL_API_BASE_URL not set, using mock financial data");
            Arc::new(MockFinanceProvider::default())
        }
    };

    let search: Arc<dyn SearchProvider> = match GoogleSearchProvider::from_env() {
        Some(provider) => Arc::new(provider),
        None => {
            warn!("Google search credentials not set, using mock search results");
            Arc::new(MockSearchProvider::default())
        }
    };

    // Workers
    let mut workers = WorkerRegistry::new();
    workers.register(Arc::new(DataWorker::new(finance)));
    workers.register(Arc::new(WebWorker::new(
        search,
        llm.clone(),
        config.search_rounds,
    )));

    // Orchestrator
    let orchestrator = Arc::new(Orchestrator::new(
        IntentClassifier::new(llm.clone()),
        workers,
        Synthesizer::new(llm),
        build_session_store(),
        config,
    ));

    info!("Orchestrator initialized");
    info!("Starting API server...");

    start_server(orchestrator, api_port).await?;

    Ok(())
}
