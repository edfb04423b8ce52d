//! Error types for the query routing orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failures that can surface from `Orchestrator::handle`.
///
/// Worker failures and timeouts are NOT represented here; they are recorded
/// as `WorkerOutcome` values inside the Turn and never abort a request.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The query was empty or whitespace-only. Rejected at the boundary.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The routing decision could not be produced. Degraded, not fatal:
    /// the orchestrator substitutes the configured fallback worker.
    #[error("Classification error: {0}")]
    ClassificationError(String),

    /// Session state could not be read or written. Fatal for the request:
    /// routing quality depends on history, so we never proceed without it.
    #[error("Session store error: {0}")]
    SessionStoreError(String),
}

/// Failures reported by external collaborators (text generation, financial
/// data, web search). Always caught at the worker or classifier boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("no results: {0}")]
    NoResults(String),
}
