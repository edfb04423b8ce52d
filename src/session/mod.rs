//! Session Store
//!
//! Per-conversation state, the only cross-request shared mutable resource.
//! Access is serialized per session id via `lock_session`; different
//! sessions never contend. In-memory by default (no persistence across
//! process restarts, a documented limitation); a Postgres backend can be
//! selected through the environment.

use crate::error::Result;
use crate::models::{Session, Turn};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

pub mod postgres;

pub use postgres::PgSessionStore;

/// Trait for session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Take the per-session guard. The orchestrator holds it across the
    /// whole `handle` call so reads and the final append never interleave
    /// between concurrent requests for the same session.
    async fn lock_session(&self, session_id: &str) -> Result<OwnedMutexGuard<()>>;

    async fn load_or_create(&self, session_id: &str) -> Result<Session>;

    /// Append a completed turn and refresh the session's activity clock.
    async fn append_turn(&self, session_id: &str, turn: Turn) -> Result<()>;

    /// Drop sessions idle for longer than `idle_timeout`. Returns how many
    /// were evicted.
    async fn evict_idle(&self, idle_timeout: Duration) -> Result<usize>;
}

/// Per-session lock table shared by the store implementations.
pub(crate) struct SessionLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub(crate) fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let existing = {
            let locks = self.locks.read().await;
            locks.get(session_id).cloned()
        };

        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                locks
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };

        lock.lock_owned().await
    }

    pub(crate) async fn remove(&self, session_ids: &[String]) {
        if session_ids.is_empty() {
            return;
        }
        let mut locks = self.locks.write().await;
        for id in session_ids {
            locks.remove(id);
        }
    }
}

/// In-memory session store for development and single-host deployments.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    locks: SessionLocks,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            locks: SessionLocks::new(),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lock_session(&self, session_id: &str) -> Result<OwnedMutexGuard<()>> {
        Ok(self.locks.acquire(session_id).await)
    }

    async fn load_or_create(&self, session_id: &str) -> Result<Session> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return Ok(session.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .clone();

        Ok(session)
    }

    async fn append_turn(&self, session_id: &str, turn: Turn) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));

        session.turns.push(turn);
        session.last_activity = Utc::now();

        Ok(())
    }

    async fn evict_idle(&self, idle_timeout: Duration) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::seconds(idle_timeout.as_secs() as i64);

        let evicted: Vec<String> = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.last_activity < cutoff)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &stale {
                sessions.remove(id);
            }
            stale
        };

        self.locks.remove(&evicted).await;

        Ok(evicted.len())
    }
}

/// Pick the session backend from the environment: Postgres when a database
/// URL is configured, in-memory otherwise.
pub fn build_session_store() -> Arc<dyn SessionStore> {
    let database_url = env::var("POSTGRES_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok();

    if let Some(url) = database_url {
        match PgSessionStore::connect_lazy(&url) {
            Ok(store) => {
                info!("Session store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres session store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Session store backend: in-memory");
    Arc::new(InMemorySessionStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoutingDecision, WorkerKind};
    use uuid::Uuid;

    fn turn(query: &str) -> Turn {
        Turn {
            turn_id: Uuid::new_v4(),
            query: query.to_string(),
            decision: RoutingDecision::Single(WorkerKind::Data),
            invocations: vec![],
            answer: "answer".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_load_or_create_and_append() {
        let store = InMemorySessionStore::new();

        let session = store.load_or_create("s1").await.unwrap();
        assert!(session.turns.is_empty());

        store.append_turn("s1", turn("first")).await.unwrap();
        store.append_turn("s1", turn("second")).await.unwrap();

        let session = store.load_or_create("s1").await.unwrap();
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].query, "first");
        assert_eq!(session.turns[1].query, "second");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        store.append_turn("a", turn("for a")).await.unwrap();

        let other = store.load_or_create("b").await.unwrap();
        assert!(other.turns.is_empty());
    }

    #[tokio::test]
    async fn test_session_guard_blocks_second_caller() {
        let store = InMemorySessionStore::new();

        let _guard = store.lock_session("s1").await.unwrap();

        // Same session must wait
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), store.lock_session("s1")).await;
        assert!(blocked.is_err());

        // A different session is unaffected
        let ok = tokio::time::timeout(Duration::from_millis(50), store.lock_session("s2")).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_evict_idle_removes_only_stale_sessions() {
        let store = InMemorySessionStore::new();
        store.append_turn("fresh", turn("q")).await.unwrap();
        store.append_turn("stale", turn("q")).await.unwrap();

        // Age the stale session by hand
        {
            let mut sessions = store.sessions.write().await;
            let session = sessions.get_mut("stale").unwrap();
            session.last_activity = Utc::now() - chrono::Duration::hours(2);
        }

        let evicted = store.evict_idle(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(evicted, 1);

        let sessions = store.sessions.read().await;
        assert!(sessions.contains_key("fresh"));
        assert!(!sessions.contains_key("stale"));
    }
}
