//! StockSage Orchestrator
//!
//! Routes free-form financial queries to specialized workers and merges
//! their answers inside a conversational session:
//! - Intent classification (keyword fast path + LLM semantic path)
//! - Delegation planning (single / sequential / parallel)
//! - Worker execution with per-invocation timeouts and partial-failure
//!   tolerance
//! - Response synthesis and per-session history
//!
//! FLOW: query -> classify -> plan -> execute worker(s) -> synthesize -> answer

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod providers;
pub mod session;
pub mod synthesizer;
pub mod workers;

pub use error::Result;

// Re-export common types
pub use classifier::IntentClassifier;
pub use config::OrchestratorConfig;
pub use models::*;
pub use orchestrator::{HandleResult, Orchestrator};
pub use planner::DelegationPlanner;
pub use synthesizer::Synthesizer;
