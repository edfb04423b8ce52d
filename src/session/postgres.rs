//! Postgres session backend
//!
//! Optional persistence for session history. Turns are stored one row each
//! with the routing decision and invocation list serialized as JSON text.
//! Any database or decode failure maps to SessionStoreError, which is fatal
//! for the request: routing quality depends on history, so we never proceed
//! with a partial read.
//!
//! The per-session guard remains in-process; the backend assumes a single
//! orchestrator host in front of the database.

use crate::error::{OrchestratorError, Result};
use crate::models::{RoutingDecision, Session, Turn, WorkerInvocation};
use crate::session::{SessionLocks, SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tokio::sync::{OnceCell, OwnedMutexGuard};
use uuid::Uuid;

pub struct PgSessionStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
    locks: SessionLocks,
}

fn db_error(context: &str, e: impl std::fmt::Display) -> OrchestratorError {
    OrchestratorError::SessionStoreError(format!("{}: {}", context, e))
}

impl PgSessionStore {
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| db_error("failed to create connection pool", e))?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
            locks: SessionLocks::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS sessions (
                      session_id TEXT PRIMARY KEY,
                      created_at TIMESTAMPTZ NOT NULL,
                      last_activity TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS session_turns (
                      turn_id UUID PRIMARY KEY,
                      session_id TEXT NOT NULL,
                      query TEXT NOT NULL,
                      decision TEXT NOT NULL,
                      invocations TEXT NOT NULL,
                      answer TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_session_turns_scope_time
                    ON session_turns (session_id, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| db_error("failed to initialize session schema", e))?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn lock_session(&self, session_id: &str) -> Result<OwnedMutexGuard<()>> {
        Ok(self.locks.acquire(session_id).await)
    }

    async fn load_or_create(&self, session_id: &str) -> Result<Session> {
        self.ensure_schema().await?;

        let session_row = sqlx::query(
            "SELECT created_at, last_activity FROM sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("failed to load session", e))?;

        let (created_at, last_activity): (DateTime<Utc>, DateTime<Utc>) = match session_row {
            Some(row) => (
                row.try_get("created_at")
                    .map_err(|e| db_error("bad session row", e))?,
                row.try_get("last_activity")
                    .map_err(|e| db_error("bad session row", e))?,
            ),
            None => {
                let now = Utc::now();
                sqlx::query(
                    "INSERT INTO sessions (session_id, created_at, last_activity) VALUES ($1, $2, $3)",
                )
                .bind(session_id)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("failed to create session", e))?;

                return Ok(Session {
                    id: session_id.to_string(),
                    turns: Vec::new(),
                    created_at: now,
                    last_activity: now,
                });
            }
        };

        let rows = sqlx::query(
            r#"
            SELECT turn_id, query, decision, invocations, answer, created_at
            FROM session_turns
            WHERE session_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("failed to load session turns", e))?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let turn_id: Uuid = row
                .try_get("turn_id")
                .map_err(|e| db_error("bad turn row", e))?;
            let decision_json: String = row
                .try_get("decision")
                .map_err(|e| db_error("bad turn row", e))?;
            let invocations_json: String = row
                .try_get("invocations")
                .map_err(|e| db_error("bad turn row", e))?;

            let decision: RoutingDecision = serde_json::from_str(&decision_json)
                .map_err(|e| db_error("undecodable routing decision", e))?;
            let invocations: Vec<WorkerInvocation> = serde_json::from_str(&invocations_json)
                .map_err(|e| db_error("undecodable invocation list", e))?;

            turns.push(Turn {
                turn_id,
                query: row
                    .try_get("query")
                    .map_err(|e| db_error("bad turn row", e))?,
                decision,
                invocations,
                answer: row
                    .try_get("answer")
                    .map_err(|e| db_error("bad turn row", e))?,
                created_at: row
                    .try_get("created_at")
                    .map_err(|e| db_error("bad turn row", e))?,
            });
        }

        Ok(Session {
            id: session_id.to_string(),
            turns,
            created_at,
            last_activity,
        })
    }

    async fn append_turn(&self, session_id: &str, turn: Turn) -> Result<()> {
        self.ensure_schema().await?;

        let decision_json = serde_json::to_string(&turn.decision)
            .map_err(|e| db_error("unencodable routing decision", e))?;
        let invocations_json = serde_json::to_string(&turn.invocations)
            .map_err(|e| db_error("unencodable invocation list", e))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("failed to begin transaction", e))?;

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, created_at, last_activity)
            VALUES ($1, $2, $2)
            ON CONFLICT (session_id) DO UPDATE SET last_activity = EXCLUDED.last_activity
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("failed to touch session", e))?;

        sqlx::query(
            r#"
            INSERT INTO session_turns
              (turn_id, session_id, query, decision, invocations, answer, created_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(turn.turn_id)
        .bind(session_id)
        .bind(&turn.query)
        .bind(&decision_json)
        .bind(&invocations_json)
        .bind(&turn.answer)
        .bind(turn.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("failed to insert turn", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("failed to commit turn", e))?;

        Ok(())
    }

    async fn evict_idle(&self, idle_timeout: Duration) -> Result<usize> {
        self.ensure_schema().await?;

        let cutoff = Utc::now() - chrono::Duration::seconds(idle_timeout.as_secs() as i64);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("failed to begin eviction", e))?;

        sqlx::query(
            r#"
            DELETE FROM session_turns
            WHERE session_id IN (SELECT session_id FROM sessions WHERE last_activity < $1)
            "#,
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("failed to evict turns", e))?;

        let deleted = sqlx::query("DELETE FROM sessions WHERE last_activity < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("failed to evict sessions", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("failed to commit eviction", e))?;

        Ok(deleted.rows_affected() as usize)
    }
}
