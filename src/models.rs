//! Core data models for the routing and orchestration engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Worker Kind =================
//

/// The closed set of specialized workers this deployment knows about.
///
/// Adding a kind means a new variant plus a registry entry; the Orchestrator
/// itself only ever does registry lookups and is untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Financial market data: quotes, indicators, fundamentals, economic series
    Data,
    /// Web search and page retrieval: news, current events, general context
    Web,
}

impl WorkerKind {
    /// Parse a kind from a label as produced by config or an LLM routing reply.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "data" | "dataworker" | "data_worker" => Some(WorkerKind::Data),
            "web" | "webworker" | "web_worker" => Some(WorkerKind::Web),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerKind::Data => "data",
            WorkerKind::Web => "web",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Routing =================
//

/// How a query is delegated. Produced fresh per query by the classifier and
/// persisted only inside the Turn record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoutingDecision {
    Single(WorkerKind),
    Sequential(Vec<WorkerKind>),
    Parallel(Vec<WorkerKind>),
}

impl RoutingDecision {
    /// Kinds named by this decision, in order for `Sequential`.
    pub fn kinds(&self) -> Vec<WorkerKind> {
        match self {
            RoutingDecision::Single(kind) => vec![*kind],
            RoutingDecision::Sequential(kinds) | RoutingDecision::Parallel(kinds) => kinds.clone(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, RoutingDecision::Parallel(_))
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingDecision::Single(kind) => write!(f, "single({})", kind),
            RoutingDecision::Sequential(kinds) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                write!(f, "sequential([{}])", names.join(", "))
            }
            RoutingDecision::Parallel(kinds) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                write!(f, "parallel([{}])", names.join(", "))
            }
        }
    }
}

//
// ================= Plan =================
//

/// One planned worker invocation: which worker, with what query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationSpec {
    pub kind: WorkerKind,
    pub query: String,
}

//
// ================= Execution =================
//

/// Result of a single worker invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerOutcome {
    Ok { text: String },
    Failed { reason: String },
    Timeout,
}

impl WorkerOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, WorkerOutcome::Ok { .. })
    }

    /// Successful text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            WorkerOutcome::Ok { text } => Some(text),
            _ => None,
        }
    }
}

/// A recorded worker invocation, owned by the Turn that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInvocation {
    pub invocation_id: Uuid,
    pub kind: WorkerKind,
    /// Query actually sent to the worker (the planner passes the original
    /// through; workers may narrow internally).
    pub query: String,
    pub outcome: WorkerOutcome,
    pub latency_ms: u64,
}

//
// ================= Session =================
//

/// One completed query/answer exchange. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: Uuid,
    pub query: String,
    pub decision: RoutingDecision,
    pub invocations: Vec<WorkerInvocation>,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Per-conversation state. Owned by the Session Store; mutated only by the
/// Orchestrator at turn boundaries. Evicted after an idle timeout; no
/// persistence guarantee across process restarts with the in-memory backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// The most recent `count` turns, oldest first.
    pub fn recent_turns(&self, count: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(count);
        &self.turns[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(query: &str) -> Turn {
        Turn {
            turn_id: Uuid::new_v4(),
            query: query.to_string(),
            decision: RoutingDecision::Single(WorkerKind::Web),
            invocations: vec![],
            answer: "answer".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_recent_turns_bounds() {
        let mut session = Session::new("s1");
        for i in 0..7 {
            session.turns.push(turn(&format!("q{}", i)));
        }

        let recent = session.recent_turns(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].query, "q4");
        assert_eq!(recent[2].query, "q6");

        // Requesting more than available returns everything
        assert_eq!(session.recent_turns(100).len(), 7);
    }

    #[test]
    fn test_decision_kinds_order() {
        let decision =
            RoutingDecision::Sequential(vec![WorkerKind::Data, WorkerKind::Web]);
        assert_eq!(decision.kinds(), vec![WorkerKind::Data, WorkerKind::Web]);
        assert!(!decision.is_parallel());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = WorkerOutcome::Ok {
            text: "AAPL at $150.25".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"ok\""));

        let timeout: WorkerOutcome = serde_json::from_str("{\"status\":\"timeout\"}").unwrap();
        assert_eq!(timeout, WorkerOutcome::Timeout);
    }

    #[test]
    fn test_worker_kind_parsing() {
        assert_eq!(WorkerKind::from_name("data"), Some(WorkerKind::Data));
        assert_eq!(WorkerKind::from_name("WebWorker"), Some(WorkerKind::Web));
        assert_eq!(WorkerKind::from_name("oracle"), None);
    }
}
