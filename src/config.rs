//! Runtime configuration
//!
//! All knobs come from the environment with lenient defaults, so the
//! orchestrator runs out of the box in development.

use crate::models::WorkerKind;
use std::env;
use std::time::Duration;

/// Orchestrator-wide configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Worker used when classification fails or stays ambiguous.
    /// Web is the default: it is the more general-purpose source.
    pub fallback_worker: WorkerKind,
    /// Most recent turns handed to the classifier as context.
    pub max_history: usize,
    /// Deadline for a single worker invocation.
    pub worker_timeout: Duration,
    /// Optimizer/retrieval rounds inside the web worker.
    pub search_rounds: usize,
    /// Idle time after which a session is evicted.
    pub session_idle_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fallback_worker: WorkerKind::Web,
            max_history: 10,
            worker_timeout: Duration::from_secs(30),
            search_rounds: 2,
            session_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl OrchestratorConfig {
    /// Build from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fallback_worker = env::var("ORCHESTRATOR_FALLBACK_WORKER")
            .ok()
            .and_then(|v| WorkerKind::from_name(&v))
            .unwrap_or(defaults.fallback_worker);

        Self {
            fallback_worker,
            max_history: env_usize("ORCHESTRATOR_MAX_HISTORY", defaults.max_history),
            worker_timeout: Duration::from_secs(env_u64(
                "WORKER_TIMEOUT_SECS",
                defaults.worker_timeout.as_secs(),
            )),
            search_rounds: env_usize("WEB_SEARCH_ROUNDS", defaults.search_rounds).max(1),
            session_idle_timeout: Duration::from_secs(env_u64(
                "SESSION_IDLE_TIMEOUT_SECS",
                defaults.session_idle_timeout.as_secs(),
            )),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.fallback_worker, WorkerKind::Web);
        assert_eq!(config.max_history, 10);
        assert_eq!(config.search_rounds, 2);
    }
}
