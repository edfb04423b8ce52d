//! Orchestrator - top-level coordinator
//!
//! One query flows through:
//! Received -> Classifying -> Planning -> Executing -> Synthesizing -> Completed
//!
//! Classification failures degrade to the configured fallback worker; worker
//! failures and timeouts are recorded in the Turn and never abort siblings.
//! Only session store failures terminate a request.

use crate::classifier::IntentClassifier;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::models::{
    InvocationSpec, RoutingDecision, Turn, WorkerInvocation, WorkerKind, WorkerOutcome,
};
use crate::planner::DelegationPlanner;
use crate::session::SessionStore;
use crate::synthesizer::Synthesizer;
use crate::workers::{Worker, WorkerRegistry};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// User-visible answer when every worker failed or timed out. The turn is
/// still recorded.
const NO_ANSWER_TEXT: &str = "Sorry, I could not retrieve the requested information \
right now. Please try again in a moment.";

/// Result of one handled query.
#[derive(Debug, Clone)]
pub struct HandleResult {
    pub answer: String,
    pub turn: Turn,
}

pub struct Orchestrator {
    classifier: IntentClassifier,
    workers: WorkerRegistry,
    synthesizer: Synthesizer,
    sessions: Arc<dyn SessionStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        classifier: IntentClassifier,
        workers: WorkerRegistry,
        synthesizer: Synthesizer,
        sessions: Arc<dyn SessionStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            classifier,
            workers,
            synthesizer,
            sessions,
            config,
        }
    }

    pub fn worker_kinds(&self) -> Vec<WorkerKind> {
        self.workers.kinds()
    }

    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Handle one query for one session. The whole call is the caller's unit
    /// of retry; failed workers are not retried internally.
    pub async fn handle(&self, session_id: &str, query: &str) -> Result<HandleResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(OrchestratorError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }

        info!(session_id = %session_id, query = %query, "Received query");

        // Serialize all work for this session: the guard is held until the
        // turn has been appended.
        let _guard = self.sessions.lock_session(session_id).await?;
        let session = self.sessions.load_or_create(session_id).await?;

        // === Classifying ===
        let decision = match self
            .classifier
            .classify(query, &session.turns, self.config.max_history)
            .await
        {
            Ok(decision) => decision,
            Err(OrchestratorError::ClassificationError(reason)) => {
                warn!(
                    session_id = %session_id,
                    reason = %reason,
                    fallback = %self.config.fallback_worker,
                    "Classification failed, routing to fallback worker"
                );
                RoutingDecision::Single(self.config.fallback_worker)
            }
            Err(other) => return Err(other),
        };

        debug!(session_id = %session_id, decision = %decision, "Routing decided");

        // === Planning ===
        let specs = DelegationPlanner::plan(&decision, query);

        // === Executing ===
        let invocations = if decision.is_parallel() {
            self.execute_parallel(&specs).await
        } else {
            self.execute_sequential(&specs).await
        };

        // === Synthesizing ===
        let successes: Vec<(WorkerKind, String)> = invocations
            .iter()
            .filter_map(|inv| inv.outcome.text().map(|text| (inv.kind, text.to_string())))
            .collect();

        let answer = match successes.len() {
            0 => {
                warn!(
                    session_id = %session_id,
                    invocations = invocations.len(),
                    "All workers failed or timed out"
                );
                NO_ANSWER_TEXT.to_string()
            }
            // Exactly one success: its text verbatim, no rewriting
            1 => successes[0].1.clone(),
            _ => self.synthesizer.synthesize(&successes).await,
        };

        // === Completed ===
        let turn = Turn {
            turn_id: Uuid::new_v4(),
            query: query.to_string(),
            decision,
            invocations,
            answer: answer.clone(),
            created_at: Utc::now(),
        };

        self.sessions.append_turn(session_id, turn.clone()).await?;

        info!(
            session_id = %session_id,
            turn_id = %turn.turn_id,
            invocations = turn.invocations.len(),
            "Turn completed"
        );

        Ok(HandleResult { answer, turn })
    }

    /// Sequential plans run strictly in order; each later invocation sees the
    /// successful results gathered so far as context.
    async fn execute_sequential(&self, specs: &[InvocationSpec]) -> Vec<WorkerInvocation> {
        let mut invocations = Vec::with_capacity(specs.len());
        let mut gathered = String::new();

        for spec in specs {
            let context = if gathered.is_empty() {
                None
            } else {
                Some(gathered.clone())
            };

            let invocation = run_invocation(
                self.workers.get(spec.kind),
                spec.clone(),
                context,
                self.config.worker_timeout,
            )
            .await;

            if let Some(text) = invocation.outcome.text() {
                if !gathered.is_empty() {
                    gathered.push_str("\n\n");
                }
                gathered.push_str(text);
            }

            invocations.push(invocation);
        }

        invocations
    }

    /// Parallel plans issue every invocation concurrently and wait for all
    /// outcomes. One worker's failure or timeout does not cancel the others.
    async fn execute_parallel(&self, specs: &[InvocationSpec]) -> Vec<WorkerInvocation> {
        let handles: Vec<_> = specs
            .iter()
            .map(|spec| {
                let worker = self.workers.get(spec.kind);
                let spec = spec.clone();
                let timeout = self.config.worker_timeout;
                tokio::spawn(run_invocation(worker, spec, None, timeout))
            })
            .collect();

        let mut invocations = Vec::with_capacity(specs.len());
        for (handle, spec) in handles.into_iter().zip(specs) {
            match handle.await {
                Ok(invocation) => invocations.push(invocation),
                Err(e) => invocations.push(WorkerInvocation {
                    invocation_id: Uuid::new_v4(),
                    kind: spec.kind,
                    query: spec.query.clone(),
                    outcome: WorkerOutcome::Failed {
                        reason: format!("worker task failed: {}", e),
                    },
                    latency_ms: 0,
                }),
            }
        }

        invocations
    }
}

/// Run one planned invocation against its worker and record the outcome.
async fn run_invocation(
    worker: Option<Arc<dyn Worker>>,
    spec: InvocationSpec,
    context: Option<String>,
    timeout: Duration,
) -> WorkerInvocation {
    let start = Instant::now();

    let outcome = match worker {
        Some(worker) => {
            worker
                .answer(&spec.query, context.as_deref(), timeout)
                .await
        }
        None => WorkerOutcome::Failed {
            reason: format!("no worker registered for kind {}", spec.kind),
        },
    };

    let latency_ms = start.elapsed().as_millis() as u64;

    match &outcome {
        WorkerOutcome::Ok { .. } => {
            debug!(kind = %spec.kind, latency_ms, "Worker invocation succeeded")
        }
        WorkerOutcome::Failed { reason } => {
            warn!(kind = %spec.kind, latency_ms, reason = %reason, "Worker invocation failed")
        }
        WorkerOutcome::Timeout => {
            warn!(kind = %spec.kind, latency_ms, "Worker invocation timed out")
        }
    }

    WorkerInvocation {
        invocation_id: Uuid::new_v4(),
        kind: spec.kind,
        query: spec.query,
        outcome,
        latency_ms,
    }
}
